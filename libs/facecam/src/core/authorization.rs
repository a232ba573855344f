// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Camera access authorization.
//!
//! Requests are asynchronous: the host shows its prompt and later delivers the
//! outcome through [`Authorizer::on_authorization_result`].

pub const CAMERA_PERMISSION: &str = "camera";
pub const CAMERA_REQUEST_CODE: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantResult {
    Granted,
    Denied,
}

pub trait Authorizer: Send {
    fn request_camera_authorization(&mut self);

    fn on_authorization_result(
        &mut self,
        request_code: i32,
        permissions: &[String],
        grant_results: &[GrantResult],
    );

    fn is_authorized(&self) -> bool;
}

/// In-process [`Authorizer`] whose decision is delivered by the caller.
#[derive(Debug, Default)]
pub struct MemoryAuthorizer {
    granted: bool,
    pending: bool,
    requests: u32,
}

impl MemoryAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Authorizer that already holds camera access.
    pub fn pre_granted() -> Self {
        Self {
            granted: true,
            ..Self::default()
        }
    }

    pub fn has_pending_request(&self) -> bool {
        self.pending
    }

    pub fn request_count(&self) -> u32 {
        self.requests
    }

    /// Arguments the host would pass back for a single camera decision.
    pub fn camera_result(grant: GrantResult) -> (i32, Vec<String>, Vec<GrantResult>) {
        (CAMERA_REQUEST_CODE, vec![CAMERA_PERMISSION.to_string()], vec![grant])
    }
}

impl Authorizer for MemoryAuthorizer {
    fn request_camera_authorization(&mut self) {
        self.requests += 1;
        if self.granted {
            tracing::debug!("Camera access already granted");
            return;
        }
        self.pending = true;
        tracing::info!("Requesting camera authorization");
    }

    fn on_authorization_result(
        &mut self,
        request_code: i32,
        permissions: &[String],
        grant_results: &[GrantResult],
    ) {
        if request_code != CAMERA_REQUEST_CODE {
            tracing::debug!("Ignoring authorization result for request {}", request_code);
            return;
        }
        self.pending = false;

        let decision = permissions
            .iter()
            .zip(grant_results)
            .find(|(permission, _)| permission.as_str() == CAMERA_PERMISSION)
            .map(|(_, grant)| *grant);

        match decision {
            Some(GrantResult::Granted) => {
                self.granted = true;
                tracing::info!("Camera authorization granted");
            }
            Some(GrantResult::Denied) => {
                self.granted = false;
                tracing::info!("Camera authorization denied");
            }
            None => tracing::warn!("Authorization result carried no camera decision"),
        }
    }

    fn is_authorized(&self) -> bool {
        self.granted
    }
}
