//! Console progress reporting.
//!
//! A [`ProgressBar`] tracks a value between `min` and `max` and writes the
//! tokens of an image to its output as the value crosses evenly spaced
//! thresholds. A [`ChildProgress`] never draws; it forwards the fraction of
//! its own range consumed by each increment to a parent sink, so a number
//! of independent operations can drive one top-level bar.
//!
//! ```
//! use paco_loader::{ProgressBar, ProgressSink};
//!
//! let mut bar = ProgressBar::new(0.0, 100.0, Vec::<u8>::new()).unwrap();
//! {
//!     let mut p = bar.scope();
//!     for _ in 0..100 {
//!         p.increment(1.0).unwrap();
//!     }
//! }
//! assert_eq!(bar.get_ref().as_slice(), b"0....5....10\n");
//! ```

use std::io::{self, Stdout, Write};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

use crate::Error;

/// Default image, a label at 0, 50 and 100 % with dots for every 10 %
pub static IMAGE_DECADE: [&str; 11] = ["0", ".", ".", ".", ".", "5", ".", ".", ".", ".", "10"];

/// A digit for every 10 % with three dots in between
pub static IMAGE_FINE: [&str; 41] = [
    "0", ".", ".", ".", "1", ".", ".", ".", "2", ".", ".", ".", "3", ".", ".", ".", "4", ".", ".",
    ".", "5", ".", ".", ".", "6", ".", ".", ".", "7", ".", ".", ".", "8", ".", ".", ".", "9", ".",
    ".", ".", "10",
];

/// A two-digit label for every percent, one line per 10 %
///
/// Meant for very long-running operations.
pub static IMAGE_PERCENT: [&str; 401] = [
    "00", ".", ".", ".", "01", ".", ".", ".", "02", ".", ".", ".", "03", ".", ".", ".", "04", ".", ".", ".", "05", ".", ".", ".", "06", ".", ".", ".", "07", ".", ".", ".", "08", ".", ".", ".", "09", ".", ".", ".",
    "10\n10", ".", ".", ".", "11", ".", ".", ".", "12", ".", ".", ".", "13", ".", ".", ".", "14", ".", ".", ".", "15", ".", ".", ".", "16", ".", ".", ".", "17", ".", ".", ".", "18", ".", ".", ".", "19", ".", ".", ".",
    "20\n20", ".", ".", ".", "21", ".", ".", ".", "22", ".", ".", ".", "23", ".", ".", ".", "24", ".", ".", ".", "25", ".", ".", ".", "26", ".", ".", ".", "27", ".", ".", ".", "28", ".", ".", ".", "29", ".", ".", ".",
    "30\n30", ".", ".", ".", "31", ".", ".", ".", "32", ".", ".", ".", "33", ".", ".", ".", "34", ".", ".", ".", "35", ".", ".", ".", "36", ".", ".", ".", "37", ".", ".", ".", "38", ".", ".", ".", "39", ".", ".", ".",
    "40\n40", ".", ".", ".", "41", ".", ".", ".", "42", ".", ".", ".", "43", ".", ".", ".", "44", ".", ".", ".", "45", ".", ".", ".", "46", ".", ".", ".", "47", ".", ".", ".", "48", ".", ".", ".", "49", ".", ".", ".",
    "50\n50", ".", ".", ".", "51", ".", ".", ".", "52", ".", ".", ".", "53", ".", ".", ".", "54", ".", ".", ".", "55", ".", ".", ".", "56", ".", ".", ".", "57", ".", ".", ".", "58", ".", ".", ".", "59", ".", ".", ".",
    "60\n60", ".", ".", ".", "61", ".", ".", ".", "62", ".", ".", ".", "63", ".", ".", ".", "64", ".", ".", ".", "65", ".", ".", ".", "66", ".", ".", ".", "67", ".", ".", ".", "68", ".", ".", ".", "69", ".", ".", ".",
    "70\n70", ".", ".", ".", "71", ".", ".", ".", "72", ".", ".", ".", "73", ".", ".", ".", "74", ".", ".", ".", "75", ".", ".", ".", "76", ".", ".", ".", "77", ".", ".", ".", "78", ".", ".", ".", "79", ".", ".", ".",
    "80\n80", ".", ".", ".", "81", ".", ".", ".", "82", ".", ".", ".", "83", ".", ".", ".", "84", ".", ".", ".", "85", ".", ".", ".", "86", ".", ".", ".", "87", ".", ".", ".", "88", ".", ".", ".", "89", ".", ".", ".",
    "90\n90", ".", ".", ".", "91", ".", ".", ".", "92", ".", ".", ".", "93", ".", ".", ".", "94", ".", ".", ".", "95", ".", ".", ".", "96", ".", ".", ".", "97", ".", ".", ".", "98", ".", ".", ".", "99", ".", ".", ".", "100",
];

/// Something that can be advanced towards completion
pub trait ProgressSink {
    /// Advance the current value by `delta`
    fn increment(&mut self, delta: f64) -> Result<(), Error>;

    /// Mark the underlying operation as complete
    fn finish(&mut self) -> Result<(), Error>;

    /// Return to the start of the range
    fn reset(&mut self);

    /// Reset now and finish when the returned guard is dropped
    fn scope(&mut self) -> Scope<'_, Self>
    where
        Self: Sized,
    {
        Scope::new(self)
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for &mut S {
    fn increment(&mut self, delta: f64) -> Result<(), Error> {
        (**self).increment(delta)
    }

    fn finish(&mut self) -> Result<(), Error> {
        (**self).finish()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Shared parent, children on other threads are serialised by the lock
impl<S: ProgressSink> ProgressSink for Arc<Mutex<S>> {
    fn increment(&mut self, delta: f64) -> Result<(), Error> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .increment(delta)
    }

    fn finish(&mut self) -> Result<(), Error> {
        self.lock().unwrap_or_else(PoisonError::into_inner).finish()
    }

    fn reset(&mut self) {
        self.lock().unwrap_or_else(PoisonError::into_inner).reset()
    }
}

fn check_range(min: f64, max: f64) -> Result<(), Error> {
    if min.is_finite() && max.is_finite() && max >= min {
        Ok(())
    } else {
        Err(Error::InvalidRange { min, max })
    }
}

/// Progress bar rendering directly to a writer
pub struct ProgressBar<'a, W> {
    out: W,
    image: &'a [&'a str],
    min: f64,
    max: f64,
    current: f64,
    rendered: usize,
    next: Option<f64>,
}

impl ProgressBar<'static, Stdout> {
    /// Create a progress bar over standard output using the default image
    pub fn stdout(min: f64, max: f64) -> Result<Self, Error> {
        Self::new(min, max, io::stdout())
    }
}

impl<'a, W: Write> ProgressBar<'a, W> {
    /// Create a progress bar using the default image
    pub fn new(min: f64, max: f64, out: W) -> Result<Self, Error> {
        Self::with_image(min, max, &IMAGE_DECADE, out)
    }

    /// Create a progress bar with a custom image
    pub fn with_image(min: f64, max: f64, image: &'a [&'a str], out: W) -> Result<Self, Error> {
        check_range(min, max)?;
        if image.is_empty() {
            return Err(Error::EmptyImage);
        }

        Ok(Self {
            out,
            image,
            min,
            max,
            current: min,
            rendered: 0,
            next: Some(min),
        })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Last value set, whether or not it caused any output
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Number of image tokens written so far
    pub fn rendered(&self) -> usize {
        self.rendered
    }

    pub fn is_finished(&self) -> bool {
        self.next.is_none()
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Reset for re-use, optionally replacing either bound
    pub fn reset_range(&mut self, min: Option<f64>, max: Option<f64>) -> Result<(), Error> {
        let min = min.unwrap_or(self.min);
        let max = max.unwrap_or(self.max);
        check_range(min, max)?;

        self.min = min;
        self.max = max;
        self.reset();

        Ok(())
    }

    /// Set the current value, writing a token for each threshold crossed.
    ///
    /// Lowering the value never removes output already written.
    pub fn set_value(&mut self, v: f64) -> Result<(), Error> {
        if self.max == self.min {
            return Err(Error::DegenerateRange(self.min));
        }

        while self.next.filter(|next| v >= *next).is_some() {
            self.out.write_all(self.image[self.rendered].as_bytes())?;
            self.rendered += 1;

            if self.rendered >= self.image.len() {
                self.next = None;
                self.out.write_all(b"\n")?;
            } else {
                let step = self.step();
                self.next = self.next.map(|next| next + step);
            }

            self.out.flush()?;
        }

        self.current = v;

        Ok(())
    }

    // Thresholds accumulate the same way `current` does under repeated
    // increments, so equal steps meet the final threshold exactly.
    fn step(&self) -> f64 {
        (self.max - self.min) / (self.image.len() - 1) as f64
    }
}

impl<'a, W: Write> ProgressSink for ProgressBar<'a, W> {
    fn increment(&mut self, delta: f64) -> Result<(), Error> {
        self.set_value(self.current + delta)
    }

    fn finish(&mut self) -> Result<(), Error> {
        if self.next.is_none() {
            return Ok(());
        }

        let image = self.image;
        for token in &image[self.rendered..] {
            self.out.write_all(token.as_bytes())?;
        }
        self.rendered = self.image.len();

        self.out.write_all(b"\n")?;
        self.out.flush()?;

        self.next = None;
        self.current = self.max;

        Ok(())
    }

    fn reset(&mut self) {
        self.current = self.min;
        self.rendered = 0;
        self.next = Some(self.min);
    }
}

/// Progress proxy forwarding normalised increments to a parent sink.
///
/// The parent is expected to span the sum of its children's contributions,
/// e.g. `[0, 1]` for a single child or `[0, n]` for `n` children.
pub struct ChildProgress<P> {
    parent: P,
    min: f64,
    max: f64,
    current: f64,
}

impl<P: ProgressSink> ChildProgress<P> {
    pub fn new(min: f64, max: f64, parent: P) -> Result<Self, Error> {
        check_range(min, max)?;

        Ok(Self {
            parent,
            min,
            max,
            current: min,
        })
    }

    /// Reset for re-use, optionally replacing either bound
    pub fn reset_range(&mut self, min: Option<f64>, max: Option<f64>) -> Result<(), Error> {
        let min = min.unwrap_or(self.min);
        let max = max.unwrap_or(self.max);
        check_range(min, max)?;

        self.min = min;
        self.max = max;
        self.current = min;

        Ok(())
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn parent(&self) -> &P {
        &self.parent
    }

    pub fn into_parent(self) -> P {
        self.parent
    }

    fn span(&self) -> Result<f64, Error> {
        let span = self.max - self.min;
        if span == 0.0 {
            return Err(Error::DegenerateRange(self.min));
        }
        Ok(span)
    }
}

impl<P: ProgressSink> ProgressSink for ChildProgress<P> {
    fn increment(&mut self, delta: f64) -> Result<(), Error> {
        let span = self.span()?;
        self.parent.increment(delta / span)?;
        self.current += delta;
        Ok(())
    }

    /// Forward whatever share of the range has not been reported yet
    fn finish(&mut self) -> Result<(), Error> {
        if let Ok(span) = self.span() {
            self.parent.increment((self.max - self.current) / span)?;
        }
        self.current = self.max;
        Ok(())
    }

    fn reset(&mut self) {
        self.current = self.min;
    }
}

/// Guard returned by [`ProgressSink::scope`].
///
/// The sink is reset on creation and finished exactly once, either through
/// [`Scope::close`] or when the guard is dropped (including on early return).
pub struct Scope<'s, S: ProgressSink + ?Sized> {
    sink: &'s mut S,
    closed: bool,
}

impl<'s, S: ProgressSink + ?Sized> Scope<'s, S> {
    pub fn new(sink: &'s mut S) -> Self {
        sink.reset();
        Self {
            sink,
            closed: false,
        }
    }

    /// Finish the sink now, returning any output error
    pub fn close(mut self) -> Result<(), Error> {
        self.closed = true;
        self.sink.finish()
    }
}

impl<'s, S: ProgressSink + ?Sized> Deref for Scope<'s, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.sink
    }
}

impl<'s, S: ProgressSink + ?Sized> DerefMut for Scope<'s, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.sink
    }
}

impl<'s, S: ProgressSink + ?Sized> Drop for Scope<'s, S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.sink.finish() {
            warn!("Error finishing progress output: {}", e);
        }
    }
}

/// Adapter driving an `indicatif` progress bar.
///
/// Increments are multiplied by `scale` and accumulated into the bar
/// position, so a bar of length `n` with scale `n` can act as the `[0, 1]`
/// parent of a [`ChildProgress`].
#[cfg(feature = "indicatif")]
pub struct IndicatifSink {
    bar: indicatif::ProgressBar,
    scale: f64,
    position: f64,
}

#[cfg(feature = "indicatif")]
impl IndicatifSink {
    pub fn new(bar: indicatif::ProgressBar) -> Self {
        Self::with_scale(bar, 1.0)
    }

    pub fn with_scale(bar: indicatif::ProgressBar, scale: f64) -> Self {
        Self {
            bar,
            scale,
            position: 0.0,
        }
    }

    pub fn bar(&self) -> &indicatif::ProgressBar {
        &self.bar
    }
}

#[cfg(feature = "indicatif")]
impl ProgressSink for IndicatifSink {
    fn increment(&mut self, delta: f64) -> Result<(), Error> {
        self.position += delta * self.scale;
        self.bar.set_position(self.position.max(0.0).round() as u64);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Error> {
        self.bar.finish();
        Ok(())
    }

    fn reset(&mut self) {
        self.position = 0.0;
        self.bar.reset();
    }
}
