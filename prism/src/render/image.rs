//! Asynchronous "load, then callback" contract for image loading. Decoding
//! and file formats belong to the loader passed in.

use std::thread;

use log::{debug, warn};

use crate::runtime::error::{EngineError, EngineResult};

const LOADER_THREAD: &str = "prism-image-loader";

pub trait LoadImageListener<T, E>: Send + 'static {
    fn on_load_succeed(&mut self, image: T);

    fn on_load_failed(&mut self, error: E);
}

/// Runs `loader` on a background thread, then reports the outcome to
/// `listener` from that same thread.
pub fn load_async<T, E, F, L>(loader: F, mut listener: L) -> EngineResult<()>
where
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: FnOnce() -> Result<T, E> + Send + 'static,
    L: LoadImageListener<T, E>,
{
    thread::Builder::new()
        .name(LOADER_THREAD.to_string())
        .spawn(move || match loader() {
            Ok(image) => {
                debug!("Image loaded");
                listener.on_load_succeed(image);
            }
            Err(err) => {
                warn!("Image load failed: {}", err);
                listener.on_load_failed(err);
            }
        })
        .map_err(|source| EngineError::Spawn {
            name: LOADER_THREAD.to_string(),
            source,
        })?;

    Ok(())
}
