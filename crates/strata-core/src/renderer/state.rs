// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command-recording state shared by every backend.
//!
//! The device facade feeds each recording call through a [`RecordingState`],
//! which panics on contract violations (drawing outside a render pass,
//! presenting with a pass still open, ...) before anything reaches the
//! native API.

use super::api::{PipelineHandle, RenderPassHandle};

/// Tracks what is bound while a frame is being recorded.
#[derive(Debug, Default, Clone)]
pub struct RecordingState {
    in_frame: bool,
    render_pass: Option<RenderPassHandle>,
    pipeline: Option<PipelineHandle>,
    index_buffer_bound: bool,
    draw_calls: u32,
}

impl RecordingState {
    /// Starts recording a frame.
    ///
    /// # Panics
    ///
    /// Panics if a frame is already being recorded.
    pub fn begin_frame(&mut self) {
        assert!(
            !self.in_frame,
            "begin_frame called while a frame is already being recorded"
        );
        *self = Self {
            in_frame: true,
            ..Self::default()
        };
    }

    /// Returns `true` between `begin_frame` and `present_frame`.
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    /// The currently open render pass.
    pub fn render_pass(&self) -> Option<RenderPassHandle> {
        self.render_pass
    }

    /// The bound pipeline, if any.
    pub fn pipeline(&self) -> Option<PipelineHandle> {
        self.pipeline
    }

    /// Draw calls recorded in this frame.
    pub fn draw_calls(&self) -> u32 {
        self.draw_calls
    }

    /// Panics unless a frame is being recorded.
    pub fn assert_in_frame(&self, operation: &str) {
        assert!(self.in_frame, "{operation} called outside of a frame");
    }

    /// Opens a render pass.
    pub fn begin_render_pass(&mut self, pass: RenderPassHandle) {
        self.assert_in_frame("begin_render_pass");
        assert!(
            self.render_pass.is_none(),
            "begin_render_pass called while another render pass is open"
        );
        self.render_pass = Some(pass);
        self.pipeline = None;
        self.index_buffer_bound = false;
    }

    /// Closes the open render pass.
    pub fn end_render_pass(&mut self) {
        assert!(
            self.render_pass.take().is_some(),
            "end_render_pass called without an open render pass"
        );
        self.pipeline = None;
        self.index_buffer_bound = false;
    }

    /// Records a pipeline bind.
    pub fn bind_pipeline(&mut self, pipeline: PipelineHandle) {
        self.assert_in_pass("bind_pipeline");
        self.pipeline = Some(pipeline);
    }

    /// Records an index buffer bind.
    pub fn bind_index_buffer(&mut self) {
        self.assert_in_pass("bind_index_buffer");
        self.index_buffer_bound = true;
    }

    /// Panics unless a render pass is open.
    pub fn assert_in_pass(&self, operation: &str) {
        self.assert_in_frame(operation);
        assert!(
            self.render_pass.is_some(),
            "{operation} called outside of a render pass"
        );
    }

    /// Validates a non-indexed draw and counts it.
    pub fn draw(&mut self) {
        self.assert_in_pass("draw");
        assert!(self.pipeline.is_some(), "draw called without a bound pipeline");
        self.draw_calls += 1;
    }

    /// Validates an indexed draw and counts it.
    pub fn draw_indexed(&mut self) {
        self.assert_in_pass("draw_indexed_instanced");
        assert!(
            self.pipeline.is_some(),
            "draw_indexed_instanced called without a bound pipeline"
        );
        assert!(
            self.index_buffer_bound,
            "draw_indexed_instanced called without a bound index buffer"
        );
        self.draw_calls += 1;
    }

    /// Ends the frame.
    ///
    /// # Panics
    ///
    /// Panics if no frame is being recorded or a render pass is still open.
    pub fn end_frame(&mut self) {
        self.assert_in_frame("present_frame");
        assert!(
            self.render_pass.is_none(),
            "present_frame called while a render pass is still open"
        );
        self.in_frame = false;
        self.pipeline = None;
        self.index_buffer_bound = false;
    }

    /// Forgets any in-progress frame, e.g. when a frame failed to start or
    /// the device is shutting down.
    pub fn abandon(&mut self) {
        let draw_calls = self.draw_calls;
        *self = Self {
            draw_calls,
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass() -> RenderPassHandle {
        RenderPassHandle::from_raw(1)
    }

    fn pipeline() -> PipelineHandle {
        PipelineHandle::from_raw(1)
    }

    #[test]
    fn full_frame_counts_draws() {
        let mut state = RecordingState::default();
        state.begin_frame();
        state.begin_render_pass(pass());
        state.bind_pipeline(pipeline());
        state.draw();
        state.bind_index_buffer();
        state.draw_indexed();
        state.end_render_pass();
        state.end_frame();
        assert_eq!(state.draw_calls(), 2);
        assert!(!state.in_frame());
    }

    #[test]
    #[should_panic(expected = "outside of a render pass")]
    fn draw_outside_a_render_pass_panics() {
        let mut state = RecordingState::default();
        state.begin_frame();
        state.draw();
    }

    #[test]
    #[should_panic(expected = "without a bound index buffer")]
    fn indexed_draw_needs_an_index_buffer() {
        let mut state = RecordingState::default();
        state.begin_frame();
        state.begin_render_pass(pass());
        state.bind_pipeline(pipeline());
        state.draw_indexed();
    }

    #[test]
    #[should_panic(expected = "render pass is still open")]
    fn present_with_open_pass_panics() {
        let mut state = RecordingState::default();
        state.begin_frame();
        state.begin_render_pass(pass());
        state.end_frame();
    }

    #[test]
    #[should_panic(expected = "already being recorded")]
    fn double_begin_frame_panics() {
        let mut state = RecordingState::default();
        state.begin_frame();
        state.begin_frame();
    }

    #[test]
    fn new_pass_unbinds_pipeline() {
        let mut state = RecordingState::default();
        state.begin_frame();
        state.begin_render_pass(pass());
        state.bind_pipeline(pipeline());
        state.end_render_pass();
        state.begin_render_pass(pass());
        assert_eq!(state.pipeline(), None);
    }
}
