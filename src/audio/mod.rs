pub mod capture;
pub mod convert;
pub mod format;
pub mod inspect;
pub mod level;
pub mod sink;
pub mod wav_sink;

pub use capture::AudioCapture;
pub use convert::normalize_to_wav;
pub use format::AudioFormat;
pub use inspect::WavReport;
pub use level::SignalLevel;
pub use sink::AudioSink;
pub use wav_sink::WavSink;
