//! Upload widget: a presentation state machine driving [`UploadClient`].
//!
//! ```text
//! Idle ──select──▶ Selected ──submit──▶ Uploading ──▶ Succeeded
//!   ▲                 ▲                     │
//!   └──── clear ──────┴───── select ────────┴───────▶ Failed
//! ```
//!
//! A failed upload keeps its file so it can be submitted again. Selecting or
//! clearing is refused while an upload is running.

use std::fmt;

use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::client::{LocalFile, UploadClient, UploadError, UploadOptions};
use crate::upload::{format_file_size, UploadProgress, DEFAULT_MAX_FILE_SIZE};
use crate::web::dto::{UploadResponse, UploadedFile};

const PROGRESS_BAR_WIDTH: usize = 20;

/// Invalid widget transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WidgetError {
    /// An upload is running.
    #[error("an upload is already in progress")]
    Busy,
    /// There is no file to upload.
    #[error("no file selected")]
    NothingSelected,
    /// There is no upload to update or finish.
    #[error("no upload in progress")]
    NotUploading,
}

/// Widget state.
#[derive(Debug, Clone)]
pub enum WidgetState {
    /// Nothing selected.
    Idle,
    /// A file is selected and ready.
    Selected {
        /// Selected file.
        file: LocalFile,
    },
    /// The file is being sent.
    Uploading {
        /// File being sent.
        file: LocalFile,
        /// Latest progress.
        progress: UploadProgress,
    },
    /// The relay stored the file.
    Succeeded {
        /// Stored file details.
        file: UploadedFile,
    },
    /// The upload failed.
    Failed {
        /// File that failed, kept for a retry.
        file: LocalFile,
        /// What went wrong.
        error: UploadError,
    },
}

/// Upload widget.
#[derive(Debug, Clone)]
pub struct UploadWidget {
    state: WidgetState,
    owner_id: Option<String>,
    max_size: u64,
    cancel: Option<CancellationToken>,
}

impl Default for UploadWidget {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadWidget {
    /// Create an idle widget.
    pub fn new() -> Self {
        Self {
            state: WidgetState::Idle,
            owner_id: None,
            max_size: DEFAULT_MAX_FILE_SIZE,
            cancel: None,
        }
    }

    /// Upload into this owner's namespace.
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Size limit shown in the idle prompt.
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    /// Cancel running uploads when `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Current state.
    pub fn state(&self) -> &WidgetState {
        &self.state
    }

    /// Whether an upload is running.
    pub fn is_uploading(&self) -> bool {
        matches!(self.state, WidgetState::Uploading { .. })
    }

    /// Select a file, discarding any previous result.
    pub fn select(&mut self, file: LocalFile) -> Result<(), WidgetError> {
        if self.is_uploading() {
            return Err(WidgetError::Busy);
        }
        self.state = WidgetState::Selected { file };
        Ok(())
    }

    /// Return to idle.
    pub fn clear(&mut self) -> Result<(), WidgetError> {
        if self.is_uploading() {
            return Err(WidgetError::Busy);
        }
        self.state = WidgetState::Idle;
        Ok(())
    }

    /// Enter the uploading state, returning the file to send.
    pub fn begin(&mut self) -> Result<LocalFile, WidgetError> {
        let file = match &self.state {
            WidgetState::Selected { file } | WidgetState::Failed { file, .. } => file.clone(),
            WidgetState::Uploading { .. } => return Err(WidgetError::Busy),
            WidgetState::Idle | WidgetState::Succeeded { .. } => {
                return Err(WidgetError::NothingSelected)
            }
        };

        self.state = WidgetState::Uploading {
            progress: UploadProgress::new(0, file.size()),
            file: file.clone(),
        };
        Ok(file)
    }

    /// Record progress. Reports that go backwards are ignored.
    pub fn on_progress(&mut self, update: UploadProgress) -> Result<(), WidgetError> {
        match &mut self.state {
            WidgetState::Uploading { progress, .. } => {
                if update.loaded >= progress.loaded {
                    *progress = update;
                }
                Ok(())
            }
            _ => Err(WidgetError::NotUploading),
        }
    }

    /// Leave the uploading state with the upload's outcome.
    pub fn finish(
        &mut self,
        result: Result<UploadResponse, UploadError>,
    ) -> Result<(), WidgetError> {
        let file = match &self.state {
            WidgetState::Uploading { file, .. } => file.clone(),
            _ => return Err(WidgetError::NotUploading),
        };

        self.state = match result {
            Ok(response) => WidgetState::Succeeded {
                file: response.file,
            },
            Err(error) => WidgetState::Failed { file, error },
        };
        Ok(())
    }

    /// Upload the selected file, calling `render` on every state change.
    pub async fn submit<R>(&mut self, client: &UploadClient, mut render: R) -> Result<(), WidgetError>
    where
        R: FnMut(&UploadWidget),
    {
        let file = self.begin()?;
        render(&*self);

        let (tx, mut rx) = watch::channel(UploadProgress::new(0, file.size()));
        let mut options = UploadOptions::default().with_progress(move |p| {
            let _ = tx.send(p);
        });
        options.owner_id = self.owner_id.clone();
        options.cancel = self.cancel.clone();

        let upload = client.upload(&file, options);
        tokio::pin!(upload);

        let mut progress_open = true;
        let result = loop {
            tokio::select! {
                result = &mut upload => break result,
                changed = rx.changed(), if progress_open => {
                    if changed.is_err() {
                        progress_open = false;
                        continue;
                    }
                    let update = *rx.borrow_and_update();
                    self.on_progress(update)?;
                    render(&*self);
                }
            }
        };

        // The final tick may land after the last poll.
        let last = *rx.borrow();
        if result.is_ok() {
            self.on_progress(last)?;
            render(&*self);
        }

        self.finish(result)?;
        render(&*self);
        Ok(())
    }
}

fn progress_bar(percentage: u8) -> String {
    let filled = usize::from(percentage.min(100)) * PROGRESS_BAR_WIDTH / 100;
    format!(
        "[{}{}]",
        "#".repeat(filled),
        ".".repeat(PROGRESS_BAR_WIDTH - filled)
    )
}

/// Human-readable link validity.
fn format_expiry(secs: u64) -> String {
    let (value, unit) = match secs {
        s if s >= 86_400 && s % 86_400 == 0 => (s / 86_400, "day"),
        s if s >= 3_600 && s % 3_600 == 0 => (s / 3_600, "hour"),
        s if s >= 60 && s % 60 == 0 => (s / 60, "minute"),
        s => (s, "second"),
    };
    if value == 1 {
        format!("1 {unit}")
    } else {
        format!("{value} {unit}s")
    }
}

impl fmt::Display for UploadWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            WidgetState::Idle => write!(
                f,
                "Choose a file (.doc or .docx, max {})",
                format_file_size(self.max_size)
            ),
            WidgetState::Selected { file } => {
                write!(f, "{} ({})", file.name, format_file_size(file.size()))
            }
            WidgetState::Uploading { file, progress } => write!(
                f,
                "Uploading {} {} {}%",
                file.name,
                progress_bar(progress.percentage),
                progress.percentage
            ),
            WidgetState::Succeeded { file } => {
                writeln!(f, "File uploaded successfully!")?;
                writeln!(f, "{}", file.original_name)?;
                writeln!(
                    f,
                    "Download: {} (expires in {})",
                    file.download_url,
                    format_expiry(file.expires_in)
                )?;
                write!(f, "Path: {}", file.path)
            }
            WidgetState::Failed { error, .. } => write!(
                f,
                "Upload failed: {}",
                error.details.as_deref().unwrap_or(&error.error)
            ),
        }
    }
}
