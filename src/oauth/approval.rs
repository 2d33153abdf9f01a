//! Resource owner approval decisions for authorization requests.

use std::collections::HashMap;

use crate::oauth::validation::ValidatedRequest;

/// Default form parameter carrying the approval answer
pub const DEFAULT_APPROVAL_PARAMETER: &str = "user_oauth_approval";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Denied,
    /// The user has not answered yet; show the approval page
    Pending,
}

/// Decides whether a validated authorization request has been approved
pub trait UserApprovalHandler: Send + Sync {
    fn decide(
        &self,
        request: &ValidatedRequest,
        user_id: &str,
        parameters: &HashMap<String, String>,
    ) -> ApprovalDecision;
}

/// Reads the answer from a single request parameter
pub struct ParameterApprovalHandler {
    parameter: String,
}

impl ParameterApprovalHandler {
    pub fn new(parameter: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
        }
    }

    pub fn parameter(&self) -> &str {
        &self.parameter
    }
}

impl Default for ParameterApprovalHandler {
    fn default() -> Self {
        Self::new(DEFAULT_APPROVAL_PARAMETER)
    }
}

impl UserApprovalHandler for ParameterApprovalHandler {
    fn decide(
        &self,
        _request: &ValidatedRequest,
        _user_id: &str,
        parameters: &HashMap<String, String>,
    ) -> ApprovalDecision {
        match parameters.get(&self.parameter).map(String::as_str) {
            Some("true") => ApprovalDecision::Approved,
            Some(_) => ApprovalDecision::Denied,
            None => ApprovalDecision::Pending,
        }
    }
}

/// Approves every request, for first-party clients
pub struct AutoApprovalHandler;

impl UserApprovalHandler for AutoApprovalHandler {
    fn decide(
        &self,
        _request: &ValidatedRequest,
        _user_id: &str,
        _parameters: &HashMap<String, String>,
    ) -> ApprovalDecision {
        ApprovalDecision::Approved
    }
}
