/// Local video production: master lookup, transcoding and probing
pub mod assets;
pub mod dimensions;
pub mod executor;
pub mod transcode;

pub use assets::{levenshtein, AssetLibrary, AssetResolver, Resolution};
pub use dimensions::{DimensionCache, Dimensions};
pub use executor::{display_command, CommandExecutor, CommandOutput, SystemExecutor};
pub use transcode::{ffmpeg_args, SourceKind, Transcoded, Transcoder};
