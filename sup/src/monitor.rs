/*
 * SPDX-FileCopyrightText: 2021 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: OSL-3.0
 */

/// Observes a parse as it walks through a stream.
///
/// The parser consults [`Monitor::is_canceled`] before every record and command and reports the
/// byte offset it has reached after every record. Neither call may block.
pub trait Monitor {

    fn is_canceled(&self) -> bool {
        false
    }

    fn progress(&mut self, _offset: usize) {
    }
}

impl Monitor for () {
}

/// A monitor built from a cancellation predicate and a progress callback.
pub struct Callbacks<C, P> {
    pub canceled: C,
    pub progress: P,
}

impl<C, P> Monitor for Callbacks<C, P> where
    C: Fn() -> bool,
    P: FnMut(usize),
{

    fn is_canceled(&self) -> bool {
        (self.canceled)()
    }

    fn progress(&mut self, offset: usize) {
        (self.progress)(offset)
    }
}
