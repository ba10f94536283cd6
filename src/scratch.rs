use crate::error::{BotError, BotResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 一時音声ファイル用ディレクトリ
///
/// ダウンロードした音声メモと合成した返信音声を置く。
/// ファイルは1メッセージの処理が終わるまでに必ず削除する。
#[derive(Debug)]
pub struct AudioFileStore {
    dir: PathBuf,
    /// 合成出力のファイル名に使う連番
    sequence: AtomicU64,
}

impl AudioFileStore {
    /// ディレクトリを作成して開く（既に存在する場合はそのまま使う）
    pub fn open<P: AsRef<Path>>(dir: P) -> BotResult<Self> {
        let dir = dir.as_ref().to_path_buf();

        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| BotError::io(&dir, e))?;
            log::info!("一時音声ディレクトリを作成: {:?}", dir);
        }

        Ok(Self {
            dir,
            sequence: AtomicU64::new(0),
        })
    }

    /// ディレクトリ内のパスを返す
    ///
    /// 名前の最後の要素だけを使うので、ディレクトリ外を指すことはない。
    pub fn acquire_path(&self, suggested_name: &str) -> PathBuf {
        let name = Path::new(suggested_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("unnamed_{}", self.next_sequence()));
        self.dir.join(name)
    }

    /// 呼び出しごとに異なるパスを返す
    ///
    /// `{prefix}_{連番}.{extension}` の形式。同時に処理される複数メッセージが
    /// 同じファイルを共有しないようにするため、合成出力は必ずこれを使う。
    pub fn unique_path(&self, prefix: &str, extension: &str) -> PathBuf {
        let seq = self.next_sequence();
        self.acquire_path(&format!("{}_{}.{}", prefix, seq, extension))
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// ファイルを削除
    ///
    /// 既に存在しない場合も成功扱い。その他のエラーはログに残して握りつぶす。
    pub async fn release(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => log::debug!("一時ファイルを削除: {:?}", path),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log::warn!("一時ファイルの削除に失敗: {:?}: {}", path, e),
        }
    }
}

/// 1メッセージ分の一時ファイル管理
///
/// 取得したパスを記録し、`release_all` で削除する。
/// `release_all` が呼ばれずにドロップされた場合（パニックなど）も
/// 同期的に削除する。
pub struct ScratchFiles {
    store: Arc<AudioFileStore>,
    paths: Vec<PathBuf>,
}

impl ScratchFiles {
    pub fn new(store: Arc<AudioFileStore>) -> Self {
        Self {
            store,
            paths: Vec::new(),
        }
    }

    /// 一意なパスを取得して記録
    pub fn acquire_unique(&mut self, prefix: &str, extension: &str) -> PathBuf {
        let path = self.store.unique_path(prefix, extension);
        self.paths.push(path.clone());
        path
    }

    /// 外部で作成されたパスも削除対象に加える（記録済みなら何もしない）
    pub fn track(&mut self, path: &Path) {
        if !self.paths.iter().any(|p| p == path) {
            self.paths.push(path.to_path_buf());
        }
    }

    /// 記録した全ファイルを削除
    pub async fn release_all(mut self) {
        for path in std::mem::take(&mut self.paths) {
            self.store.release(&path).await;
        }
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => log::debug!("一時ファイルを削除 (drop): {:?}", path),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => log::warn!("一時ファイルの削除に失敗 (drop): {:?}: {}", path, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("nested").join("temp_audio");

        let store = AudioFileStore::open(&dir).unwrap();
        assert!(dir.is_dir());

        // 2回目も成功する
        AudioFileStore::open(&dir).unwrap();
        assert_eq!(store.acquire_path("a.ogg"), dir.join("a.ogg"));
    }

    #[test]
    fn test_acquire_path_stays_inside_dir() {
        let temp_dir = TempDir::new().unwrap();
        let store = AudioFileStore::open(temp_dir.path()).unwrap();

        let path = store.acquire_path("../../etc/passwd");
        assert_eq!(path, temp_dir.path().join("passwd"));

        let path = store.acquire_path("abc123.ogg");
        assert_eq!(path, temp_dir.path().join("abc123.ogg"));
    }

    #[test]
    fn test_unique_path_is_distinct() {
        let temp_dir = TempDir::new().unwrap();
        let store = AudioFileStore::open(temp_dir.path()).unwrap();

        let a = store.unique_path("reply", "ogg");
        let b = store.unique_path("reply", "ogg");
        assert_ne!(a, b);
        assert_eq!(a.extension().unwrap(), "ogg");
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = AudioFileStore::open(temp_dir.path()).unwrap();

        let path = store.acquire_path("voice.ogg");
        tokio::fs::write(&path, b"data").await.unwrap();

        store.release(&path).await;
        assert!(!path.exists());

        // 2回目、および作成されていないパスでもエラーにならない
        store.release(&path).await;
        store.release(&store.acquire_path("never_created.ogg")).await;
    }

    #[tokio::test]
    async fn test_scratch_files_release_all() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(AudioFileStore::open(temp_dir.path()).unwrap());

        let mut files = ScratchFiles::new(store.clone());
        let input = files.acquire_unique("input", "ogg");
        let output = files.acquire_unique("reply", "ogg");
        let _missing = files.acquire_unique("missing", "ogg");
        let external = store.acquire_path("resp.ogg");
        files.track(&output);
        files.track(&external);
        tokio::fs::write(&input, b"in").await.unwrap();
        tokio::fs::write(&output, b"out").await.unwrap();
        tokio::fs::write(&external, b"ext").await.unwrap();

        files.release_all().await;

        assert!(!input.exists());
        assert!(!output.exists());
        assert!(!external.exists());
    }

    #[test]
    fn test_scratch_files_drop_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(AudioFileStore::open(temp_dir.path()).unwrap());

        let path;
        {
            let mut files = ScratchFiles::new(store);
            path = files.acquire_unique("dropped", "ogg");
            fs::write(&path, b"x").unwrap();
        }

        assert!(!path.exists());
    }
}
