pub mod ble;
pub mod client;
pub mod error;
pub mod gate;
pub mod media;
pub mod series;
pub mod settings;
pub mod transfer;
pub mod utils;
pub mod uuids;

pub use ble::adapter::BluerTransport;
pub use ble::transport::{CharacteristicAddress, GattTransport};
pub use client::{
    AppmaisClient, ClimateLine, CommandOutcome, CpuLine, LatestLines, PictureOutcome, ScaleLine,
    SensorChannel,
};
pub use error::{Error, Result};
pub use gate::{ClockTime, TimeWindow};
pub use media::MediaInfo;
pub use series::{LedgerValue, SeriesState};
pub use settings::DeviceSettings;
pub use transfer::{FileSource, Framing};
