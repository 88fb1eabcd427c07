//! Visibility resolution
//!
//! Computes, from a normalized form and the current values, the ordered
//! subsequence of visible steps and the ordered visible fields within each.
//! A step or field with no conditions is always visible; with conditions it
//! is visible only when every condition holds. Field conditions are
//! evaluated only while the containing step is visible.
//!
//! Two field lists are exposed per step: the validity-relevant list feeding
//! schema generation (labels and hidden fields excluded, so decorative text
//! can never block a submit) and a display list that keeps labels for the
//! rendering layer.

use std::collections::HashMap;

use crate::condition::{evaluate, ValueMap};
use crate::config::{Field, FieldType, Step};
use crate::expand::NormalizedForm;

/// The currently-relevant slice of a normalized form.
#[derive(Debug, Clone, Default)]
pub struct VisibleForm {
    /// Visible steps in base order, with their full field lists.
    pub steps: Vec<Step>,

    /// Per visible step: visible fields that participate in validation.
    pub fields_by_step: HashMap<String, Vec<Field>>,

    /// Per visible step: visible fields for display (labels included,
    /// hidden fields still excluded).
    pub display_fields_by_step: HashMap<String, Vec<Field>>,
}

impl VisibleForm {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Position of a step in the visible sequence.
    pub fn position_of(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }

    /// Validity-relevant fields of the step at a visible position.
    pub fn validatable_fields(&self, position: usize) -> &[Field] {
        self.steps
            .get(position)
            .and_then(|s| self.fields_by_step.get(&s.id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All validity-relevant fields across every visible step, in order.
    pub fn all_validatable_fields(&self) -> Vec<&Field> {
        self.steps
            .iter()
            .flat_map(|s| {
                self.fields_by_step
                    .get(&s.id)
                    .map(Vec::as_slice)
                    .unwrap_or(&[])
            })
            .collect()
    }
}

fn step_visible(step: &Step, values: &ValueMap) -> bool {
    step.conditions.iter().all(|c| evaluate(c, values))
}

fn field_visible(field: &Field, values: &ValueMap) -> bool {
    field.conditions.iter().all(|c| evaluate(c, values))
}

/// Resolve the visible subsequence. Pure: identical inputs give identical
/// output, call it as often as the UI likes.
pub fn resolve(form: &NormalizedForm, values: &ValueMap) -> VisibleForm {
    let mut visible = VisibleForm::default();

    for step in &form.steps {
        if !step_visible(step, values) {
            continue;
        }

        let shown: Vec<&Field> = step
            .fields
            .iter()
            .filter(|f| field_visible(f, values))
            .collect();

        let validatable: Vec<Field> = shown
            .iter()
            .filter(|f| f.is_validatable())
            .map(|f| (*f).clone())
            .collect();
        let display: Vec<Field> = shown
            .iter()
            .filter(|f| f.field_type != FieldType::Hidden)
            .map(|f| (*f).clone())
            .collect();

        visible.fields_by_step.insert(step.id.clone(), validatable);
        visible
            .display_fields_by_step
            .insert(step.id.clone(), display);
        visible.steps.push(step.clone());
    }

    visible
}
