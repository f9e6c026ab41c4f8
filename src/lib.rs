pub mod archive;
pub mod audio;
pub mod capture;
pub mod config;
pub mod http;
pub mod ids;
pub mod session;
pub mod transport;

pub use archive::{Archiver, NoopArchiver};
pub use audio::{
    AudioFrame, MixEngine, MixError, MixInput, MixOutcome, MixSettings, Track,
};
pub use capture::{AlignmentCapture, CaptureEvent, ParticipantCapture};
pub use config::Config;
pub use http::{create_router, AppState};
pub use ids::{ChannelId, GroupId, ParticipantId};
pub use session::{
    Recorder, RecorderConfig, Session, SessionRegistry, StartError, StartReceipt, StopError,
    StopRejection, StopSummary,
};
pub use transport::{
    ChannelInfo, ChannelKind, NameResolver, SimTransport, TransportError, VoiceConnection,
    VoiceTransport,
};
