use std::sync::Arc;

use crate::caption::GlyphSource;
use crate::config::Config;
use crate::dispatcher::PhotoTransport;
use crate::policy::{AccessPolicy, GroupGate};

/// Shared, read-only state handed to every worker.
#[derive(Clone)]
pub struct BotState {
    /// Parsed once at startup; rendering only borrows it.
    pub font: Arc<dyn GlyphSource>,
    pub transport: Arc<dyn PhotoTransport>,
    pub policy: Arc<AccessPolicy>,
    pub group_gate: Arc<GroupGate>,
    /// Caption candidates, one picked uniformly per photo.
    pub phrases: Arc<[String]>,
}

impl BotState {
    pub fn new(
        config: &Config,
        font: Arc<dyn GlyphSource>,
        transport: Arc<dyn PhotoTransport>,
    ) -> Self {
        Self {
            font,
            transport,
            policy: Arc::new(AccessPolicy::new(
                config.whitelist.clone(),
                config.blacklist.clone(),
            )),
            group_gate: Arc::new(GroupGate {
                enabled: config.group.enabled,
                activation_phrase: config.group.activation_phrase.clone(),
                activation_probability: config.group.activation_probability,
            }),
            phrases: config.phrases.clone().into(),
        }
    }
}
