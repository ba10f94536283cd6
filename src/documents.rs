use crate::error::{BotError, BotResult};
use regex_lite::Regex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;

/// 読み込み対象の拡張子
const DOCUMENT_EXTENSIONS: [&str; 3] = ["txt", "md", "markdown"];

/// 分割に使う区切り文字（優先順）
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// 検索対象の文書片
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// 元ファイル名
    pub source: String,
    pub text: String,
}

/// 読み込んだ文書
#[derive(Clone, Debug)]
pub struct Document {
    pub source: String,
    pub text: String,
}

/// ディレクトリ内のテキスト文書を読み込み
///
/// ディレクトリが存在しない場合は空を返す（回答は文脈なしで生成される）。
pub fn load_documents<P: AsRef<Path>>(dir: P) -> BotResult<Vec<Document>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        log::warn!("文書ディレクトリが見つかりません: {:?}", dir);
        return Ok(Vec::new());
    }

    let blank_runs = Regex::new(r"[ \t]+").map_err(|e| BotError::Config(e.to_string()))?;
    let newline_runs = Regex::new(r"\n{3,}").map_err(|e| BotError::Config(e.to_string()))?;

    let mut entries: Vec<_> = fs::read_dir(dir)
        .map_err(|e| BotError::io(dir, e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| DOCUMENT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
        })
        .collect();
    entries.sort();

    let mut documents = Vec::new();
    for path in entries {
        let raw = fs::read_to_string(&path).map_err(|e| BotError::io(&path, e))?;
        let text = raw.replace("\r\n", "\n");
        let text = blank_runs.replace_all(&text, " ");
        let text = newline_runs.replace_all(&text, "\n\n");
        let text = text.trim().to_string();
        if text.is_empty() {
            continue;
        }

        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        documents.push(Document { source, text });
    }

    log::info!("文書を {} 件読み込みました: {:?}", documents.len(), dir);
    Ok(documents)
}

/// 文書を検索用の断片に分割
pub fn split_documents(documents: &[Document], chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| {
            split_text(&doc.text, chunk_size, overlap)
                .into_iter()
                .map(move |text| Chunk {
                    source: doc.source.clone(),
                    text,
                })
        })
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// テキストを `chunk_size` 文字以下の断片に分割
///
/// 段落 → 行 → 単語 → 文字 の順に区切りを試し、隣接する断片は
/// 最大 `overlap` 文字重なる。
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size.saturating_sub(1));
    split_recursive(text, &SEPARATORS, chunk_size, overlap)
}

fn split_recursive(
    text: &str,
    separators: &[&str],
    chunk_size: usize,
    overlap: usize,
) -> Vec<String> {
    let (index, separator) = separators
        .iter()
        .enumerate()
        .find(|(_, s)| s.is_empty() || text.contains(**s))
        .map(|(i, s)| (i, *s))
        .unwrap_or((separators.len(), ""));
    let remaining = &separators[(index + 1).min(separators.len())..];

    let pieces: Vec<&str> = if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split(separator).filter(|s| !s.is_empty()).collect()
    };

    let mut chunks = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for piece in pieces {
        if char_len(piece) < chunk_size {
            pending.push(piece);
            continue;
        }

        if !pending.is_empty() {
            chunks.extend(merge_pieces(&pending, separator, chunk_size, overlap));
            pending.clear();
        }

        if remaining.is_empty() {
            chunks.push(piece.to_string());
        } else {
            chunks.extend(split_recursive(piece, remaining, chunk_size, overlap));
        }
    }

    if !pending.is_empty() {
        chunks.extend(merge_pieces(&pending, separator, chunk_size, overlap));
    }

    chunks
}

fn merge_pieces(pieces: &[&str], separator: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let sep_len = char_len(separator);
    let mut merged = Vec::new();
    let mut current: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for &piece in pieces {
        let len = char_len(piece);
        let joiner = if current.is_empty() { 0 } else { sep_len };

        if total + len + joiner > chunk_size && !current.is_empty() {
            push_joined(&mut merged, &current, separator);

            // 重なり分だけ残して先頭から捨てる
            while total > overlap
                || (total > 0
                    && total + len + if current.is_empty() { 0 } else { sep_len } > chunk_size)
            {
                let Some(first) = current.pop_front() else {
                    break;
                };
                let removed = char_len(first) + if current.is_empty() { 0 } else { sep_len };
                total = total.saturating_sub(removed);
            }
        }

        if !current.is_empty() {
            total += sep_len;
        }
        current.push_back(piece);
        total += len;
    }

    push_joined(&mut merged, &current, separator);
    merged
}

fn push_joined(out: &mut Vec<String>, pieces: &VecDeque<&str>, separator: &str) {
    let joined = pieces.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// 文書検索の共通トレイト
pub trait Retriever: Send + Sync {
    /// 問い合わせに関連する断片を最大 `k` 件返す（関連度の高い順）
    fn retrieve(&self, query: &str, k: usize) -> Vec<Chunk>;
}

const STOP_WORDS: [&str; 24] = [
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "how", "in", "is", "it", "of",
    "on", "or", "that", "the", "this", "to", "was", "what", "with",
];

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// メモリ上の語彙一致（TF-IDF）による検索
pub struct KeywordRetriever {
    chunks: Vec<Chunk>,
    term_counts: Vec<HashMap<String, usize>>,
    document_frequency: HashMap<String, usize>,
}

impl KeywordRetriever {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        let term_counts: Vec<HashMap<String, usize>> = chunks
            .iter()
            .map(|chunk| {
                let mut counts = HashMap::new();
                for token in tokenize(&chunk.text) {
                    *counts.entry(token).or_insert(0) += 1;
                }
                counts
            })
            .collect();

        let mut document_frequency = HashMap::new();
        for counts in &term_counts {
            for term in counts.keys() {
                *document_frequency.entry(term.clone()).or_insert(0) += 1;
            }
        }

        Self {
            chunks,
            term_counts,
            document_frequency,
        }
    }

    fn score(&self, index: usize, terms: &HashSet<String>) -> f64 {
        let n = self.chunks.len() as f64;
        terms
            .iter()
            .filter_map(|term| {
                let tf = *self.term_counts[index].get(term)? as f64;
                let df = *self.document_frequency.get(term).unwrap_or(&0) as f64;
                let idf = ((n + 1.0) / (df + 1.0)).ln() + 1.0;
                Some((1.0 + tf).ln() * idf)
            })
            .sum()
    }
}

impl Retriever for KeywordRetriever {
    fn retrieve(&self, query: &str, k: usize) -> Vec<Chunk> {
        let terms: HashSet<String> = tokenize(query).into_iter().collect();
        if terms.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f64)> = (0..self.chunks.len())
            .map(|i| (i, self.score(i, &terms)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        scored
            .into_iter()
            .take(k)
            .map(|(i, _)| self.chunks[i].clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_split_short_text_single_chunk() {
        let chunks = split_text("Machine learning is a field of AI.", 1000, 200);
        assert_eq!(chunks, vec!["Machine learning is a field of AI.".to_string()]);
    }

    #[test]
    fn test_split_respects_size_and_overlap() {
        let text = (0..10).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        let chunks = split_text(&text, 20, 5);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 20, "chunk too long: {:?}", chunk);
        }

        // 隣接する断片は重なる
        let last_word = chunks[0].split(' ').last().unwrap();
        assert!(chunks[1].split(' ').any(|w| w == last_word));
    }

    #[test]
    fn test_split_prefers_paragraphs() {
        let text = "first paragraph here\n\nsecond paragraph here";
        let chunks = split_text(text, 25, 0);
        assert_eq!(
            chunks,
            vec![
                "first paragraph here".to_string(),
                "second paragraph here".to_string()
            ]
        );
    }

    #[test]
    fn test_split_long_word_falls_back_to_chars() {
        let text = "a".repeat(25);
        let chunks = split_text(&text, 10, 0);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn test_load_documents_filters_and_normalizes() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), "Hello\t\t world\r\n\n\n\nNext").unwrap();
        fs::write(temp_dir.path().join("b.md"), "# Title").unwrap();
        fs::write(temp_dir.path().join("c.bin"), "ignored").unwrap();
        fs::write(temp_dir.path().join("empty.txt"), "   ").unwrap();

        let docs = load_documents(temp_dir.path()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source, "a.txt");
        assert_eq!(docs[0].text, "Hello world\n\nNext");
        assert_eq!(docs[1].source, "b.md");
    }

    #[test]
    fn test_load_documents_missing_dir() {
        let docs = load_documents("/nonexistent/documents").unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_keyword_retriever_ranks_relevant_chunk_first() {
        let chunks = vec![
            Chunk {
                source: "farming.txt".to_string(),
                text: "Crop rotation keeps soil healthy.".to_string(),
            },
            Chunk {
                source: "ml.txt".to_string(),
                text: "Machine learning lets computers learn from data. Machine learning is AI."
                    .to_string(),
            },
            Chunk {
                source: "schemes.txt".to_string(),
                text: "The pension scheme supports farmers.".to_string(),
            },
        ];
        let retriever = KeywordRetriever::new(chunks);

        let results = retriever.retrieve("What is machine learning?", 4);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "ml.txt");

        assert!(retriever.retrieve("the of and", 4).is_empty());
        assert!(retriever.retrieve("soil", 0).is_empty());
    }
}
