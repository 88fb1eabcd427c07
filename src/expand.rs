//! Config normalization: array-template expansion
//!
//! A raw config declares repeatable field groups as blueprints sized by a
//! controlling count field (one-to-four co-borrowers, up to three funding
//! sources). Normalization turns those blueprints into concrete fields with
//! instance-qualified names, hosted on a step synthesized immediately after
//! the step carrying the controlling field.
//!
//! Normalization is a pure function of `(config, values)`: identical inputs
//! always produce a structurally identical result, which is what makes
//! re-renders stable and lets tests diff successive computations.

use serde_json::Value;
use tracing::{debug, warn};

use crate::condition::ValueMap;
use crate::config::{ArrayTemplate, Field, FormConfig, Step};

/// A config with every array template materialized into concrete steps.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedForm {
    /// Final ordered step sequence, synthesized host steps included.
    pub steps: Vec<Step>,
}

impl NormalizedForm {
    /// Position of a step in the normalized sequence.
    pub fn position_of(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }
}

/// Expand every array template in `config` against the current values.
pub fn normalize(config: &FormConfig, values: &ValueMap) -> NormalizedForm {
    let mut steps: Vec<Step> = Vec::with_capacity(config.steps.len());

    for step in &config.steps {
        steps.push(step.clone());

        // A step may control several templates; host steps keep template
        // declaration order (the template map is ordered by name).
        for (template_name, template) in &config.array_templates {
            let controls = step
                .fields
                .iter()
                .any(|f| f.array_controller.as_deref() == Some(template_name.as_str()));
            if controls {
                steps.push(host_step(template_name, template, step, values));
            }
        }
    }

    NormalizedForm { steps }
}

/// Resolve the instance count for a template: the controlling field's
/// current value when it is numeric and in bounds, else the declared
/// default clamped into bounds.
pub fn instance_count(template: &ArrayTemplate, values: &ValueMap) -> u32 {
    let declared = values.get(&template.count_field).and_then(parse_count);
    match declared {
        Some(n) if n >= template.min_count && n <= template.max_count => n,
        Some(n) => {
            warn!(
                template = %template.name,
                count = n,
                min = template.min_count,
                max = template.max_count,
                "count field out of bounds, falling back to default"
            );
            clamp(template.default_count, template)
        }
        None => {
            debug!(
                template = %template.name,
                count_field = %template.count_field,
                "count field absent or non-numeric, using default"
            );
            clamp(template.default_count, template)
        }
    }
}

/// Instance-qualified name for one materialized blueprint field.
pub fn instance_field_name(template_name: &str, index: u32, base: &str) -> String {
    format!("{}[{}].{}", template_name, index, base)
}

fn host_step(
    template_name: &str,
    template: &ArrayTemplate,
    controlling_step: &Step,
    values: &ValueMap,
) -> Step {
    let count = instance_count(template, values);
    let mut fields = Vec::with_capacity(template.field_template.len() * count as usize);
    for index in 0..count {
        for blueprint in &template.field_template {
            fields.push(instantiate(template_name, index, blueprint));
        }
    }
    Step {
        id: template_name.to_string(),
        name: template.name.clone(),
        description: String::new(),
        order: controlling_step.order,
        required: controlling_step.required,
        // The host step hides whenever its controlling step hides.
        conditions: controlling_step.conditions.clone(),
        fields,
    }
}

fn instantiate(template_name: &str, index: u32, blueprint: &Field) -> Field {
    let mut field = blueprint.clone();
    field.id = instance_field_name(template_name, index, &blueprint.id);
    field.name = instance_field_name(template_name, index, &blueprint.name);
    field.array_index = Some(index);
    field
}

fn parse_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => {
            let f = n.as_f64()?;
            (f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64).then_some(f as u32)
        }
        // Dropdown-sourced counts arrive as strings.
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn clamp(count: u32, template: &ArrayTemplate) -> u32 {
    count.clamp(template.min_count, template.max_count)
}
