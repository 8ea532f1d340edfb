//! Service layer: chapter OCR and translation flows.
//!
//! Each flow composes a [`Provider`](crate::provider::Provider), the batch
//! orchestrator and the extractor. Services can be used by the CLI or any
//! other front end.

pub mod ocr;
pub mod translate;

pub use ocr::{combine_pages, failed_pages, list_page_images, ocr_pages, PageFailure, PageText};
pub use translate::{translate_chapters, translate_text, TranslationOutcome, TranslationRequest};
