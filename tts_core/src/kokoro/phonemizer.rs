use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};

const CLAUSE_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':'];

/// Text to IPA phonemes.
pub trait Phonemizer: Send + Sync {
    fn phonemize(&self, text: &str, lang: &str) -> Result<String>;
}

/// Phonemizes through the `espeak-ng` (or `espeak`) executable.
///
/// espeak drops punctuation from its IPA output, so text is phonemized
/// clause by clause and the punctuation is put back in between. Kokoro
/// relies on it for prosody and for batching.
#[derive(Debug, Clone)]
pub struct EspeakPhonemizer {
    program: String,
}

impl EspeakPhonemizer {
    pub fn new(program: impl Into<String>) -> Result<Self> {
        let program = program.into();
        let status = Command::new(&program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("Phonemizer '{program}' not found. Install espeak-ng or set ESPEAK_PROGRAM."))?;
        if !status.success() {
            bail!("Phonemizer '{program}' is not usable (exit status {status})");
        }
        Ok(Self { program })
    }

    fn run(&self, clause: &str, lang: &str) -> Result<String> {
        let output = Command::new(&self.program)
            .args(["-q", "--ipa", "-v", lang])
            .arg(clause)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to run phonemizer '{}'", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("Phonemizer '{}' failed: {}", self.program, stderr.trim());
        }

        let stdout = String::from_utf8(output.stdout).context("Phonemizer emitted non-utf8 output")?;
        Ok(stdout.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

impl Phonemizer for EspeakPhonemizer {
    fn phonemize(&self, text: &str, lang: &str) -> Result<String> {
        let mut out = String::new();
        for (clause, punct) in split_clauses(text) {
            if !clause.is_empty() {
                if !out.is_empty() && !out.ends_with(' ') {
                    out.push(' ');
                }
                out.push_str(&self.run(clause, lang)?);
            }
            if let Some(p) = punct {
                out.push(p);
                out.push(' ');
            }
        }
        Ok(out.trim().to_string())
    }
}

/// Split text into trimmed clauses and the punctuation mark ending each.
fn split_clauses(text: &str) -> Vec<(&str, Option<char>)> {
    let mut clauses = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if CLAUSE_PUNCTUATION.contains(&c) {
            clauses.push((text[start..i].trim(), Some(c)));
            start = i + c.len_utf8();
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        clauses.push((tail, None));
    }
    clauses
}
