use std::io::Write;

/// Operator facing output of one session console.
pub trait Transcript {
    fn append_line(&mut self, line: &str);

    fn clear(&mut self);

    /// Insert text verbatim, without line decoration.
    fn insert_raw(&mut self, text: &str);
}

/// Transcript kept in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryTranscript {
    lines: Vec<String>,
}

impl MemoryTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn last(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }
}

impl Transcript for MemoryTranscript {
    fn append_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn clear(&mut self) {
        self.lines.clear();
    }

    fn insert_raw(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }
}

/// Transcript printed to the terminal.
#[derive(Debug, Default)]
pub struct StdoutTranscript;

impl Transcript for StdoutTranscript {
    fn append_line(&mut self, line: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", line);
    }

    fn clear(&mut self) {
        // ANSI clear screen, cursor home
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\x1b[2J\x1b[H");
        let _ = out.flush();
    }

    fn insert_raw(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "{}", text);
        let _ = out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_transcript() {
        let mut transcript = MemoryTranscript::new();
        transcript.append_line("[*] [1a2b3c4d] Tasked agent to list jobs");
        transcript.append_line("[-] Not enough arguments");
        assert_eq!(transcript.lines().len(), 2);
        assert_eq!(transcript.last(), Some("[-] Not enough arguments"));

        transcript.clear();
        transcript.insert_raw("banner");
        assert_eq!(transcript.lines(), &["banner".to_string()]);
    }
}
