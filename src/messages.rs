use crate::models::{DeviceInfo, RecordRequest, Recording};
use anyhow::Result;
use tokio::sync::oneshot;

/// Commands for the Recorder service
pub enum RecorderCommand {
    Record {
        request: RecordRequest,
        reply: oneshot::Sender<Result<Recording>>,
    },
    ListDevices(oneshot::Sender<Result<Vec<DeviceInfo>>>),
}

