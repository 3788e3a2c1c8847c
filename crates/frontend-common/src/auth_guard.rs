//! Authorization guard for protected routes

use crate::auth::SessionSnapshot;
use crate::config::RoutingConfig;
use campus_core::{RoleSet, RouteTable, User, can_access};

/// Outcome of guarding one navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Session restoration has not settled yet; show a neutral loading state
    Loading,
    /// Not authenticated
    RedirectToLogin,
    /// Authenticated without a permitted role
    RedirectToUnauthorized,
    /// Render the requested view
    Render,
}

impl RouteDecision {
    /// Decide from the raw session facts and the roles a route requires
    pub fn evaluate(authenticated: bool, user: Option<&User>, required_roles: &RoleSet) -> Self {
        if !authenticated {
            Self::RedirectToLogin
        } else if can_access(user, required_roles) {
            Self::Render
        } else {
            Self::RedirectToUnauthorized
        }
    }
}

/// Route guard over a static rule table
#[derive(Debug, Clone)]
pub struct RouteGuard {
    routes: RouteTable,
    login_path: String,
    unauthorized_path: String,
}

impl RouteGuard {
    pub fn new(config: RoutingConfig) -> Self {
        Self {
            routes: config.rules,
            login_path: config.login_path,
            unauthorized_path: config.unauthorized_path,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Decide what to show for `path` given the current session
    pub fn decide(&self, session: &SessionSnapshot, path: &str) -> RouteDecision {
        let Some(rule) = self.routes.rule_for(path) else {
            return RouteDecision::Render;
        };

        if !session.is_settled() {
            return RouteDecision::Loading;
        }

        RouteDecision::evaluate(session.authenticated, session.user.as_ref(), &rule.roles)
    }

    /// Path to navigate to for a redirect decision
    pub fn redirect_target(&self, decision: &RouteDecision) -> Option<&str> {
        match decision {
            RouteDecision::RedirectToLogin => Some(&self.login_path),
            RouteDecision::RedirectToUnauthorized => Some(&self.unauthorized_path),
            RouteDecision::Loading | RouteDecision::Render => None,
        }
    }
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(RoutingConfig::default())
    }
}
