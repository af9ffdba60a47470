use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::runtime::error::{EngineError, EngineResult};

/// The two capabilities the engine needs from a 2D drawing backend. Path and
/// shape drawing live on the concrete type and are reached through
/// [`Canvas::raster_mut`].
pub trait Rasterizer: Send + 'static {
    fn allocate(size: SurfaceSize) -> EngineResult<Self>
    where
        Self: Sized;

    fn begin_pass(&mut self);

    fn end_pass(&mut self);

    fn resize(&mut self, _size: SurfaceSize) {}

    fn release(&mut self) {}
}

/// The view hosting the sketch. Only its measured size is consumed.
pub trait HostSurface: Send + Sync + 'static {
    fn size(&self) -> (u32, u32);
}

/// Fixed host size, handy for headless hosts and tests.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FixedHost(pub u32, pub u32);

impl HostSurface for FixedHost {
    fn size(&self) -> (u32, u32) {
        (self.0, self.1)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SurfaceSize {
    pub w: u32,
    pub h: u32,
}

impl SurfaceSize {
    /// Scales a host size into render surface dimensions. Non-positive results
    /// are rejected instead of yielding an empty surface.
    pub fn scaled(host: (u32, u32), scale: f32) -> EngineResult<Self> {
        let w = (host.0 as f32 * scale).floor();
        let h = (host.1 as f32 * scale).floor();

        if !(w >= 1.0 && h >= 1.0) {
            return Err(EngineError::InvalidSurfaceSize {
                width: host.0,
                height: host.1,
                scale,
            });
        }

        Ok(Self {
            w: w as u32,
            h: h as u32,
        })
    }
}

pub struct Canvas<R> {
    raster: R,
    size: SurfaceSize,
    passes: u64,
}

impl<R: Rasterizer> Canvas<R> {
    pub(crate) fn allocate(size: SurfaceSize) -> EngineResult<Self> {
        Ok(Self {
            raster: R::allocate(size)?,
            size,
            passes: 0,
        })
    }

    pub fn raster(&self) -> &R {
        &self.raster
    }

    pub fn raster_mut(&mut self) -> &mut R {
        &mut self.raster
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn w(&self) -> u32 {
        self.size.w
    }

    pub fn h(&self) -> u32 {
        self.size.h
    }

    /// Number of completed paint passes on this canvas.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Runs `f` between exactly one matched begin/end pair.
    pub fn paint<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.raster.begin_pass();
        let out = f(self);
        self.raster.end_pass();
        self.passes += 1;
        out
    }

    pub(crate) fn resize(&mut self, size: SurfaceSize) {
        if size != self.size {
            self.size = size;
            self.raster.resize(size);
        }
    }

    fn release(mut self) {
        self.raster.release();
    }
}

/// Shared, possibly-empty handle to the rendering surface. Clones point to the
/// same canvas; the canvas is absent before setup and after destroy.
pub struct SurfaceHandle<R>(Arc<Mutex<Option<Canvas<R>>>>);

impl<R> Clone for SurfaceHandle<R> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<R> Default for SurfaceHandle<R> {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(None)))
    }
}

impl<R: Rasterizer> SurfaceHandle<R> {
    pub fn is_allocated(&self) -> bool {
        self.0.lock().is_some()
    }

    pub fn size(&self) -> Option<SurfaceSize> {
        self.0.lock().as_ref().map(Canvas::size)
    }

    /// Locks the canvas for the duration of `f`. Returns `None` when no
    /// surface is allocated.
    pub fn with_canvas<T>(
        &self,
        f: impl FnOnce(&mut Canvas<R>) -> T,
    ) -> Option<T> {
        self.0.lock().as_mut().map(f)
    }

    pub(crate) fn install(&self, canvas: Canvas<R>) {
        if let Some(previous) = self.0.lock().replace(canvas) {
            previous.release();
        }
    }

    /// Waits up to `timeout` for the canvas, hands it to `last` and releases
    /// it. Returns false, without calling `last`, when the wait times out.
    pub(crate) fn release_with(
        &self,
        timeout: Duration,
        last: impl FnOnce(Option<&mut Canvas<R>>),
    ) -> bool {
        let Some(mut slot) = self.0.try_lock_for(timeout) else {
            return false;
        };

        last(slot.as_mut());
        if let Some(canvas) = slot.take() {
            canvas.release();
        }
        true
    }

    pub(crate) fn release(&self) -> bool {
        let canvas = self.0.lock().take();
        canvas.map(Canvas::release).is_some()
    }
}
