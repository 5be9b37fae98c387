//! Masked-language-model side of the rhyme generator.
//!
//! - Black-box model and tokenizer interfaces (`MaskedLanguageModel`, `MaskTokenizer`)
//! - Vocabulary weighting (`TokenWeighter`)
//! - The iterative mask-and-refill loop (`RhymeGenerator`)
//! - A fixed-length run over one seed sentence (`RhymeSession`)
//! - A candle adapter for BERT checkpoints (`bert`, behind the `bert` feature)

/// Model and tokenizer traits.
pub mod traits;

/// Per-token sampling weights.
pub mod token_weighter;

/// Iterative masked-token resampling.
pub mod generator;

/// Session bookkeeping: iteration count, progress and highlighted lines.
pub mod session;

/// BERT checkpoints loaded with candle and tokenizers.
#[cfg(feature = "bert")]
pub mod bert;

pub use generator::RhymeGenerator;
pub use session::{RhymeSession, SessionConfig, Step, Line};
pub use token_weighter::TokenWeighter;
pub use traits::{MaskTokenizer, MaskedLanguageModel};
