//! Sequential chunked label mutation

use log::{debug, info, warn};

use crate::error::Result;
use crate::models::{LabelId, MessageId};
use crate::service::MailService;

/// Add and remove labels on `ids`, one remote call per chunk of `batch_size`
///
/// Chunks are sent strictly in order. The first failing chunk stops the
/// remaining ones and its error is returned; chunks applied before it stay
/// applied. Returns the number of messages covered by successful chunks.
pub fn modify_labels<S>(
    remote: &S,
    ids: &[MessageId],
    add: &[LabelId],
    remove: &[LabelId],
    batch_size: usize,
) -> Result<usize>
where
    S: MailService + ?Sized,
{
    if ids.is_empty() || (add.is_empty() && remove.is_empty()) {
        return Ok(0);
    }

    let batch_size = batch_size.max(1);
    let chunks = ids.len().div_ceil(batch_size);
    let mut applied = 0;

    for (index, chunk) in ids.chunks(batch_size).enumerate() {
        debug!("Modifying labels: chunk {}/{} ({} messages)", index + 1, chunks, chunk.len());
        if let Err(e) = remote.batch_modify(chunk, add, remove) {
            warn!(
                "Label change stopped at chunk {}/{}; {} of {} messages already changed",
                index + 1,
                chunks,
                applied,
                ids.len()
            );
            return Err(e);
        }
        applied += chunk.len();
    }

    info!("Changed labels on {} messages", applied);
    Ok(applied)
}
