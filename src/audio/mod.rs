pub mod frame;
pub mod mix;
pub mod track;

pub use frame::AudioFrame;
pub use mix::{build_mix_args, MixEngine, MixError, MixInput, MixOutcome, MixSettings};
pub use track::{compute_delay_ms, finalize_tracks, sanitize_filename, Track};
