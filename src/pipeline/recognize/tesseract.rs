//! Classical OCR through the `tesseract` command-line tool.

use super::{PageRecognizer, RecognizeError, Recognition};
use crate::config::TesseractOptions;
use crate::error::ExtractError;
use crate::output::PageImage;
use crate::pipeline::encode::encode_png;
use async_trait::async_trait;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, instrument};

const ENGINE: &str = "tesseract";

/// OCR engine wrapping the `tesseract` CLI.
///
/// Stateless per image: each page is written to its own temp directory as
/// PNG and read back from the tool's stdout.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    options: TesseractOptions,
    dpi: u32,
    installed_languages: Vec<String>,
}

impl TesseractRecognizer {
    /// Check that the binary runs and list its language packs.
    pub async fn probe(options: TesseractOptions, dpi: u32) -> Result<Self, ExtractError> {
        let output = Command::new(&options.binary)
            .arg("--list-langs")
            .output()
            .await
            .map_err(|e| ExtractError::RecognizerUnavailable {
                engine: ENGINE.to_string(),
                hint: format!(
                    "Cannot run '{}': {}\n\
                     Install tesseract-ocr (e.g. `apt install tesseract-ocr tesseract-ocr-spa`)\n\
                     or point --tesseract-bin at the binary.",
                    options.binary.display(),
                    e
                ),
            })?;

        let installed_languages = if output.status.success() {
            parse_list_langs(&String::from_utf8_lossy(&output.stdout))
        } else {
            Vec::new()
        };
        debug!("tesseract languages: {:?}", installed_languages);

        Ok(Self {
            options,
            dpi,
            installed_languages,
        })
    }
}

#[async_trait]
impl PageRecognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        ENGINE
    }

    #[instrument(level = "debug", skip_all, fields(page = page.page_num))]
    async fn recognize(&self, page: &PageImage) -> Result<Recognition, RecognizeError> {
        let png = encode_png(&page.image)
            .map_err(|e| RecognizeError::new(format!("cannot encode page as PNG: {e}")))?;

        let tmpdir = tempfile::TempDir::with_prefix("tesseract")
            .map_err(|e| RecognizeError::new(format!("cannot create temp dir: {e}")))?;
        let input_path = tmpdir.path().join("page.png");
        tokio::fs::write(&input_path, &png)
            .await
            .map_err(|e| RecognizeError::new(format!("cannot write tesseract input file: {e}")))?;

        let mut cmd = Command::new(&self.options.binary);
        cmd.arg(&input_path)
            .arg("stdout")
            .arg("--dpi")
            .arg(self.dpi.to_string());
        if let Some(ref lang) = self.options.language {
            cmd.arg("-l").arg(lang);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| RecognizeError::new(format!("cannot run tesseract: {e}")))?;
        check_for_command_failure(&output)?;

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("tesseract returned {} chars", text.len());
        Ok(Recognition::text(text))
    }

    fn preflight(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        match self.options.language {
            None => warnings.push(
                "No OCR language set; tesseract falls back to English. \
                 Use --lang spa for Spanish documents."
                    .to_string(),
            ),
            Some(ref lang) if !self.installed_languages.is_empty() => {
                for code in lang.split('+').filter(|c| !c.is_empty()) {
                    if !self.installed_languages.iter().any(|l| l == code) {
                        warnings.push(format!(
                            "tesseract language pack '{code}' is not installed"
                        ));
                    }
                }
            }
            Some(_) => {}
        }
        warnings
    }
}

fn check_for_command_failure(output: &Output) -> Result<(), RecognizeError> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(RecognizeError::new(format!(
        "tesseract exited with {}: {}",
        output.status,
        stderr.trim()
    )))
}

/// Parse `tesseract --list-langs` output, skipping the header line.
fn parse_list_langs(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip_while(|l| !l.starts_with("List of available languages"))
        .skip(1)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
