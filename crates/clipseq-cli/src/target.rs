use clipseq_core::{PasteStep, PasteTarget};
use std::io::Write;

/// Paste target for terminals: each step's content is written out as one block.
pub struct WriterTarget<W: Write> {
    out: W,
}

impl<W: Write> WriterTarget<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> PasteTarget for WriterTarget<W> {
    fn paste(&mut self, step: &PasteStep) -> anyhow::Result<()> {
        match step {
            PasteStep::Text { text, .. } => writeln!(self.out, "{}", text)?,
            PasteStep::Image { path, .. } => writeln!(self.out, "{}", path)?,
            PasteStep::Files { paths, .. } => {
                for p in paths {
                    writeln!(self.out, "{}", p)?;
                }
            }
        }
        self.out.flush()?;
        Ok(())
    }
}
