// crates/revguard-vcs/src/credentials.rs
// ============================================================================
// Module: Revguard VCS Credentials
// Description: Per-provider auth tokens the adapter stamps onto outbound
//   requests.
// Purpose: Stand in for the out-of-scope `VcsClientProvider` capability
//   (§1) with the minimal shape this crate needs: one bearer token per
//   provider, resolved by the caller (CLI config, test fixture) and handed
//   in whole.
// Dependencies: none
// ============================================================================

use revguard_core::VcsProvider;

/// Bearer tokens for each supported provider. A project only ever uses the
/// one matching its own [`VcsProvider`]; the others may be left empty.
#[derive(Debug, Clone, Default)]
pub struct VcsCredentials {
    /// Token for GitHub App / PAT auth.
    pub github_token: Option<String>,
    /// Token for GitLab OAuth / PAT auth.
    pub gitlab_token: Option<String>,
    /// Token for Bitbucket Cloud app-password / OAuth auth.
    pub bitbucket_token: Option<String>,
}

impl VcsCredentials {
    /// Returns the token for `provider`, if configured.
    #[must_use]
    pub fn token_for(&self, provider: VcsProvider) -> Option<&str> {
        match provider {
            VcsProvider::Github => self.github_token.as_deref(),
            VcsProvider::Gitlab => self.gitlab_token.as_deref(),
            VcsProvider::BitbucketCloud => self.bitbucket_token.as_deref(),
        }
    }
}
