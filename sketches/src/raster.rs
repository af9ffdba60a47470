use prism::prelude::*;

/// Headless backend: keeps the marks of the current pass and logs a summary
/// of every pass at trace level.
#[derive(Debug)]
pub struct LogRasterizer {
    size: SurfaceSize,
    marks: Vec<Mark>,
    in_pass: bool,
    passes: u64,
    total_marks: u64,
}

#[derive(Clone, Copy, Debug)]
struct Mark {
    x: f32,
    y: f32,
    radius: f32,
}

impl LogRasterizer {
    pub fn circle(&mut self, x: f32, y: f32, radius: f32) {
        if !self.in_pass {
            warn!("circle outside of a paint pass ignored");
            return;
        }
        self.marks.push(Mark { x, y, radius });
    }

    pub fn total_marks(&self) -> u64 {
        self.total_marks
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }
}

impl Rasterizer for LogRasterizer {
    fn allocate(size: SurfaceSize) -> EngineResult<Self> {
        if size.w > 16_384 || size.h > 16_384 {
            return Err(EngineError::Raster(format!(
                "{}x{} exceeds the headless surface limit",
                size.w, size.h
            )));
        }

        info!("Allocated {}x{} headless surface", size.w, size.h);

        Ok(Self {
            size,
            marks: Vec::new(),
            in_pass: false,
            passes: 0,
            total_marks: 0,
        })
    }

    fn begin_pass(&mut self) {
        self.marks.clear();
        self.in_pass = true;
    }

    fn end_pass(&mut self) {
        self.in_pass = false;
        self.passes += 1;
        self.total_marks += self.marks.len() as u64;

        if self.marks.is_empty() {
            return;
        }

        let n = self.marks.len() as f32;
        let cx = self.marks.iter().map(|m| m.x).sum::<f32>() / n;
        let cy = self.marks.iter().map(|m| m.y).sum::<f32>() / n;
        let area: f32 = self
            .marks
            .iter()
            .map(|m| std::f32::consts::PI * m.radius * m.radius)
            .sum();
        let coverage = area / (self.size.w * self.size.h) as f32;

        trace!(
            "pass {}: {} marks around ({:.1}, {:.1}), coverage {:.3}",
            self.passes,
            self.marks.len(),
            cx,
            cy,
            coverage
        );
    }

    fn resize(&mut self, size: SurfaceSize) {
        debug!("Resized to {}x{}", size.w, size.h);
        self.size = size;
    }

    fn release(&mut self) {
        info!(
            "Released surface after {} passes and {} marks",
            self.passes, self.total_marks
        );
    }
}
