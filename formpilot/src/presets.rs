//! Ready-made workflows.
//!
//! Field labels and entry points for the App Store Connect "New App" dialog
//! live here as plain data, so the engine stays site-agnostic.

use serde::{Deserialize, Serialize};

use crate::workflow::{PostCondition, Step, WorkflowConfig, WorkflowSettings};
use crate::{Selector, TextPattern};

pub const ASC_APPS_URL: &str = "https://appstoreconnect.apple.com/apps";

/// The record page URL contains the numeric app id once creation went through.
pub const ASC_APP_CREATED_URL_PATTERN: &str = r"/apps/\d+";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppPlatform {
    Ios,
    MacOs,
    TvOs,
    VisionOs,
}

impl AppPlatform {
    /// Label shown next to the platform checkbox
    pub fn label(self) -> &'static str {
        match self {
            AppPlatform::Ios => "iOS",
            AppPlatform::MacOs => "macOS",
            AppPlatform::TvOs => "tvOS",
            AppPlatform::VisionOs => "visionOS",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    Full,
    Limited,
}

impl AccessLevel {
    pub fn label(self) -> &'static str {
        match self {
            AccessLevel::Full => "Full Access",
            AccessLevel::Limited => "Limited Access",
        }
    }
}

/// Caller-supplied values for a new app record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRecordParams {
    pub app_name: String,
    /// Must already be registered in the developer portal
    pub bundle_id: String,
    pub sku: String,
    pub platform: AppPlatform,
    /// Primary language as shown in the list, e.g. "English (U.S.)"
    pub language: String,
    #[serde(default)]
    pub access: AccessLevel,
}

/// Workflow that creates an App Store Connect app record.
///
/// Login and two-factor prompts are left to the human at the first
/// checkpoint; the final review happens before the Create button is pressed.
pub fn app_record_workflow(params: &AppRecordParams, settings: WorkflowSettings) -> WorkflowConfig {
    let platform = TextPattern::exact(params.platform.label());
    let access = TextPattern::exact(params.access.label());

    let steps = vec![
        Step::navigate(ASC_APPS_URL),
        Step::checkpoint("Log in to App Store Connect and complete 2FA if prompted"),
        Step::click("the New App button", TextPattern::contains("New App")).with_strategies(vec![
            Selector::role("button", TextPattern::contains("New App")),
            Selector::role("button", TextPattern::contains("Add App")),
            Selector::role("button", TextPattern::contains("Create App")),
        ]),
        Step::click("the platform selection", platform.clone()).with_strategies(vec![
            Selector::role("checkbox", platform.clone()),
            Selector::role("radio", platform.clone()),
            Selector::role("button", platform),
        ]),
        Step::fill("App Name", TextPattern::contains("App Name"), &params.app_name),
        Step::choose(
            "Primary Language",
            TextPattern::contains("Primary Language"),
            &params.language,
        ),
        Step::choose("Bundle ID", TextPattern::contains("Bundle ID"), &params.bundle_id),
        Step::fill("SKU", TextPattern::contains("SKU"), &params.sku),
        Step::click("the user access option", access.clone()).with_strategies(vec![
            Selector::role("radio", access.clone()),
            Selector::Label(access),
        ]),
        Step::checkpoint("Review the form and confirm everything looks correct"),
        Step::click("the Create button", TextPattern::exact("Create"))
            .with_strategies(vec![Selector::role("button", TextPattern::exact("Create"))])
            .as_submit(),
    ];

    let mut settings = settings;
    if settings.post_condition.is_none() {
        settings.post_condition = Some(PostCondition {
            url_pattern: ASC_APP_CREATED_URL_PATTERN.to_string(),
            timeout_ms: crate::workflow::DEFAULT_POST_CONDITION_TIMEOUT_MS,
        });
    }

    WorkflowConfig::new(format!("create app '{}'", params.app_name), steps, settings)
}
