//! Extension descriptors, raw and validated.

use crate::extensions::hooks::{ExtensionHooks, HookError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Default icon of an extension's menu entry.
pub const DEFAULT_MENU_ICON: &str = "view_module";

/// Builds a flow from the data a user entered in a skill form.
pub type FlowGenerator = Arc<dyn Fn(&Value) -> Result<Value, HookError> + Send + Sync>;

/// A skill an extension contributes to the flow editor.
#[derive(Clone, Default)]
pub struct Skill {
    /// Skill id, unique within its extension.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Icon name.
    pub icon: Option<String>,
    /// Generator producing the skill's flow.
    pub flow_generator: Option<FlowGenerator>,
}

impl Skill {
    /// Create a skill without generator.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), icon: None, flow_generator: None }
    }

    /// Set the icon.
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Set the flow generator.
    #[must_use]
    pub fn with_flow_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, HookError> + Send + Sync + 'static,
    {
        self.flow_generator = Some(Arc::new(generator));
        self
    }
}

impl fmt::Debug for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Skill")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("icon", &self.icon)
            .field("flow_generator", &self.flow_generator.is_some())
            .finish()
    }
}

/// Skill metadata as listed by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillSummary {
    /// Skill id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Icon name.
    pub icon: Option<String>,
    /// Name of the extension providing the skill.
    pub module_name: String,
}

/// Layout options of an extension's main view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleView {
    /// Let the view use the whole width of the page.
    #[serde(default)]
    pub stretched: bool,
}

/// Normalized `definition` block of an extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionDefinition {
    /// Unique name. Compared case-insensitively.
    pub name: String,
    /// Human-readable name.
    pub full_name: String,
    /// Frontend plugins.
    pub plugins: Vec<Value>,
    /// The extension has no main view.
    pub no_interface: bool,
    /// Main view layout.
    pub module_view: ModuleView,
    /// Menu icon.
    pub menu_icon: String,
    /// Menu label.
    pub menu_text: String,
    /// Project homepage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    /// Whether the extension is experimental.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<bool>,
    /// Workspace-level application settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_app: Option<Value>,
}

/// A bot template shipped by an extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotTemplate {
    /// Template id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub desc: String,
    /// Name of the extension providing the template. Set by the registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    /// Full name of the extension providing the template. Set by the registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
}

/// A dialog condition shipped by an extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogCondition {
    /// Condition id.
    pub id: String,
    /// Display label.
    #[serde(default)]
    pub label: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Position in condition lists. Missing orders sort last.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i64>,
    /// Remaining fields (params, evaluation details), opaque to the runtime.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What a loader produces for an extension, before validation.
///
/// `manifest` carries the declarative part (`definition`, `skills`,
/// `translations`, `botTemplates`, `dialogConditions`); code travels in
/// `skills` and `hooks`.
#[derive(Debug, Clone, Default)]
pub struct ExtensionEntryPoint {
    /// Declarative manifest.
    pub manifest: Value,
    /// Skills with their flow generators.
    pub skills: Vec<Skill>,
    /// JSON schema of the extension's configuration.
    pub config_schema: Option<Value>,
    /// Lifecycle hooks.
    pub hooks: ExtensionHooks,
}

impl ExtensionEntryPoint {
    /// Create an entry point from a manifest.
    pub fn new(manifest: Value) -> Self {
        Self { manifest, ..Self::default() }
    }

    /// Add a skill.
    #[must_use]
    pub fn with_skill(mut self, skill: Skill) -> Self {
        self.skills.push(skill);
        self
    }

    /// Set the configuration schema.
    #[must_use]
    pub fn with_config_schema(mut self, schema: Value) -> Self {
        self.config_schema = Some(schema);
        self
    }

    /// Set the hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: ExtensionHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// `definition.name`, if the manifest declares a string there.
    pub fn declared_name(&self) -> Option<&str> {
        self.manifest.get("definition")?.get("name")?.as_str()
    }
}

/// A validated extension with normalized definition.
#[derive(Debug, Clone)]
pub struct ExtensionDescriptor {
    /// Definition with defaults applied.
    pub definition: ExtensionDefinition,
    /// Skills.
    pub skills: Vec<Skill>,
    /// Translations, by language.
    pub translations: Map<String, Value>,
    /// Bot templates.
    pub bot_templates: Vec<BotTemplate>,
    /// Dialog conditions.
    pub dialog_conditions: Vec<DialogCondition>,
    /// JSON schema of the extension's configuration.
    pub config_schema: Option<Value>,
    /// Lifecycle hooks.
    pub hooks: ExtensionHooks,
}
