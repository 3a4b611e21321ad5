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

//! A scriptable in-process GPU timeline for exercising the frame engine.

use super::deletion::{DeferredResource, ResourceKind};
use crate::renderer::{FenceStatus, NativeBackend, RenderError};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Submitted { slot: usize, submission: u64 },
    Waited { slot: usize, submission: u64 },
    Released { kind: ResourceKind, id: u32, completed: u64 },
    Destroyed { slot: usize },
}

#[derive(Debug)]
pub(crate) struct MockFence {
    slot: usize,
    submission: Option<u64>,
}

#[derive(Debug)]
pub(crate) struct MockCommands {
    pub begun: u32,
}

/// Submissions complete only when the test says so, or when a fence wait
/// blocks on them and `complete_on_wait` is set.
#[derive(Debug, Default)]
pub(crate) struct MockNative {
    pub submitted: u64,
    pub completed: u64,
    pub complete_on_wait: bool,
    pub events: Vec<Event>,
}

impl MockNative {
    pub fn new() -> Self {
        Self {
            complete_on_wait: true,
            ..Self::default()
        }
    }

    /// Lets the GPU finish every submission up to and including `submission`.
    pub fn complete(&mut self, submission: u64) {
        self.completed = self.completed.max(submission.min(self.submitted));
    }

    pub fn released_ids(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Released { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn waits(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, Event::Waited { .. }))
            .count()
    }
}

impl NativeBackend for MockNative {
    type Fence = MockFence;
    type CommandContext = MockCommands;
    type Buffer = u32;
    type Sampler = u32;
    type Texture = u32;
    type RenderTarget = u32;
    type Framebuffer = u32;
    type RenderPass = u32;

    fn create_frame_context(
        &mut self,
        slot: usize,
    ) -> Result<(Self::Fence, Self::CommandContext), RenderError> {
        Ok((
            MockFence {
                slot,
                submission: None,
            },
            MockCommands { begun: 0 },
        ))
    }

    fn wait_fence(
        &mut self,
        fence: &Self::Fence,
        _timeout: Duration,
    ) -> Result<FenceStatus, RenderError> {
        let Some(submission) = fence.submission else {
            return Ok(FenceStatus::Signaled);
        };
        if submission <= self.completed {
            return Ok(FenceStatus::Signaled);
        }
        if !self.complete_on_wait {
            return Ok(FenceStatus::TimedOut);
        }
        self.events.push(Event::Waited {
            slot: fence.slot,
            submission,
        });
        self.completed = submission;
        Ok(FenceStatus::Signaled)
    }

    fn reset_fence(&mut self, fence: &mut Self::Fence) {
        fence.submission = None;
    }

    fn begin_commands(&mut self, context: &mut Self::CommandContext) -> Result<(), RenderError> {
        context.begun += 1;
        Ok(())
    }

    fn submit(
        &mut self,
        _context: &mut Self::CommandContext,
        fence: &mut Self::Fence,
    ) -> Result<(), RenderError> {
        self.submitted += 1;
        fence.submission = Some(self.submitted);
        self.events.push(Event::Submitted {
            slot: fence.slot,
            submission: self.submitted,
        });
        Ok(())
    }

    fn release(&mut self, resource: DeferredResource<Self>) {
        let kind = resource.kind();
        let id = match resource {
            DeferredResource::Buffer(id)
            | DeferredResource::Sampler(id)
            | DeferredResource::Texture(id)
            | DeferredResource::RenderTarget(id)
            | DeferredResource::Framebuffer(id)
            | DeferredResource::RenderPass(id) => id,
        };
        self.events.push(Event::Released {
            kind,
            id,
            completed: self.completed,
        });
    }

    fn destroy_frame_context(&mut self, fence: Self::Fence, _context: Self::CommandContext) {
        self.events.push(Event::Destroyed { slot: fence.slot });
    }
}
