//! Consumes a CoNLL-U-like pre-annotated record format one sentence at a
//! time: UTF-8 decoded leniently (malformed bytes become the replacement
//! character), multi-word-token lines skipped, each token's POS resolved
//! as XPOS-else-UPOS.

use std::io::BufRead;

use crate::error::{CorruptError, Error};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// 0-based position within the sentence.
    pub position: u32,
    pub surface: String,
    pub lemma: String,
    pub pos: String,
    pub start_offset: u32,
    pub end_offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceRecord {
    pub sentence_id: u64,
    pub text: String,
    pub tokens: Vec<Token>,
}

/// Streams [`SentenceRecord`]s out of a CoNLL-U-like reader. Blank lines
/// separate sentences; a `# text = …` comment supplies the reconstructed
/// sentence text (falling back to a space-joined surface form when absent).
pub struct SentenceReader<R> {
    inner: R,
    next_sentence_id: u64,
}

impl<R: BufRead> SentenceReader<R> {
    pub fn new(inner: R) -> Self {
        SentenceReader { inner, next_sentence_id: 0 }
    }

    /// Reads the next sentence, or `Ok(None)` at end of input.
    pub fn next_sentence(&mut self) -> Result<Option<SentenceRecord>, Error> {
        let mut text: Option<String> = None;
        let mut tokens = Vec::new();
        let mut saw_any_line = false;
        let mut raw = Vec::new();

        loop {
            raw.clear();
            let read = self
                .inner
                .read_until(b'\n', &mut raw)
                .map_err(Error::Io)?;
            if read == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if saw_any_line {
                    break;
                }
                continue;
            }
            saw_any_line = true;

            if let Some(rest) = line.strip_prefix("# text") {
                if let Some(value) = rest.trim_start().strip_prefix('=') {
                    text = Some(value.trim().to_string());
                }
                continue;
            }
            if line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 4 {
                return Err(CorruptError::TruncatedRecord {
                    context: "conllu token line",
                    needed: 4,
                    had: fields.len(),
                }
                .into());
            }
            let id = fields[0];
            if id.contains('-') || id.contains('.') {
                // multi-word token or empty node: not an indexable word.
                continue;
            }
            let surface = fields[1].to_string();
            let lemma = fields[2].to_lowercase();
            let upos = fields[3];
            let xpos = fields.get(4).copied().unwrap_or("_");
            let pos = if xpos != "_" && !xpos.is_empty() { xpos } else { upos }.to_string();

            tokens.push(Token {
                position: tokens.len() as u32,
                surface,
                lemma,
                pos,
                start_offset: 0,
                end_offset: 0,
            });
        }

        if !saw_any_line && tokens.is_empty() {
            return Ok(None);
        }

        let text = text.unwrap_or_else(|| {
            tokens.iter().map(|t| t.surface.as_str()).collect::<Vec<_>>().join(" ")
        });
        resolve_offsets(&text, &mut tokens);

        let sentence_id = self.next_sentence_id;
        self.next_sentence_id += 1;
        Ok(Some(SentenceRecord { sentence_id, text, tokens }))
    }
}

/// Locates each token's surface form in the reconstructed text in order,
/// advancing a cursor so repeated surface forms get distinct offsets. A
/// token whose surface cannot be found from the current cursor (e.g. a
/// tokenizer contraction with no literal match) keeps a zero-width span
/// anchored at the cursor, rather than failing the whole sentence.
fn resolve_offsets(text: &str, tokens: &mut [Token]) {
    let mut cursor = 0usize;
    for token in tokens.iter_mut() {
        match text[cursor..].find(token.surface.as_str()) {
            Some(found) => {
                let start = cursor + found;
                let end = start + token.surface.len();
                token.start_offset = start as u32;
                token.end_offset = end as u32;
                cursor = end;
            }
            None => {
                token.start_offset = cursor as u32;
                token.end_offset = cursor as u32;
            }
        }
    }
}

impl<R: BufRead> Iterator for SentenceReader<R> {
    type Item = Result<SentenceRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_sentence().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_a_single_sentence_with_text_comment() {
        let input = "# text = the big dog runs\n\
                     1\tthe\tthe\tDET\t_\t_\t_\t_\t_\t_\n\
                     2\tbig\tbig\tADJ\tJJ\t_\t_\t_\t_\t_\n\
                     3\tdog\tdog\tNOUN\tNN\t_\t_\t_\t_\t_\n\
                     4\truns\trun\tVERB\tVBZ\t_\t_\t_\t_\t_\n\
                     \n";
        let mut reader = SentenceReader::new(Cursor::new(input));
        let sentence = reader.next_sentence().unwrap().unwrap();
        assert_eq!(sentence.text, "the big dog runs");
        assert_eq!(sentence.tokens.len(), 4);
        assert_eq!(sentence.tokens[1].lemma, "big");
        assert_eq!(sentence.tokens[1].pos, "JJ");
        assert_eq!(sentence.tokens[0].pos, "DET");
        assert!(reader.next_sentence().unwrap().is_none());
    }

    #[test]
    fn skips_multiword_token_lines() {
        let input = "1-2\tdont\t_\t_\t_\t_\t_\t_\t_\t_\n\
                     1\tdo\tdo\tAUX\t_\t_\t_\t_\t_\t_\n\
                     2\tnt\tnot\tPART\t_\t_\t_\t_\t_\t_\n\
                     \n";
        let mut reader = SentenceReader::new(Cursor::new(input));
        let sentence = reader.next_sentence().unwrap().unwrap();
        assert_eq!(sentence.tokens.len(), 2);
        assert_eq!(sentence.tokens[0].lemma, "do");
        assert_eq!(sentence.tokens[1].lemma, "not");
    }

    #[test]
    fn two_sentences_get_distinct_ids() {
        let input = "1\ta\ta\tDET\t_\t_\t_\t_\t_\t_\n\n1\tb\tb\tNOUN\t_\t_\t_\t_\t_\t_\n\n";
        let mut reader = SentenceReader::new(Cursor::new(input));
        let s0 = reader.next_sentence().unwrap().unwrap();
        let s1 = reader.next_sentence().unwrap().unwrap();
        assert_eq!(s0.sentence_id, 0);
        assert_eq!(s1.sentence_id, 1);
    }
}
