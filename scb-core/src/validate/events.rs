//! Event id allocation and event reference resolution.

use tracing::info;

use super::Validator;
use crate::diagnostics::WarningKind;
use crate::error::{CompileError, Result};
use crate::model::EventGroup;

/// Resolves `reference` against `groups` without side effects.
///
/// Returns the qualified `Group.event` form and whether it had to be qualified.
pub fn lookup_event(
    groups: &[EventGroup],
    context: &str,
    reference: &str,
) -> Result<(String, bool)> {
    let reference = reference.trim();
    let unresolved = || CompileError::UnresolvedReference {
        context: context.to_string(),
        kind: "event",
        reference: reference.to_string(),
    };

    if let Some((group, event)) = reference.split_once('.') {
        let known = groups
            .iter()
            .any(|g| g.name == group.trim() && g.contains(event.trim()));
        return if known {
            Ok((format!("{}.{}", group.trim(), event.trim()), false))
        } else {
            Err(unresolved())
        };
    }

    let owners: Vec<&EventGroup> = groups.iter().filter(|g| g.contains(reference)).collect();
    match owners.as_slice() {
        [] => Err(unresolved()),
        [group] => Ok((format!("{}.{reference}", group.name), true)),
        _ => Err(CompileError::AmbiguousReference {
            context: context.to_string(),
            event: reference.to_string(),
            groups: owners.iter().map(|g| g.name.clone()).collect(),
        }),
    }
}

impl Validator<'_> {
    /// Assigns missing bases, rejects overlapping or zero-based ranges, then numbers events.
    pub fn allocate_event_ids(&mut self) -> Result<()> {
        let mut previous_end: Option<u32> = None;
        for group in &mut self.model.groups {
            if group.base.is_none() {
                let base = previous_end.unwrap_or(1);
                group.base = Some(base);
                self.diag.warn(
                    WarningKind::AutoAssignedBase,
                    format!("event group {} has no base, using {base}", group.name),
                );
            }
            previous_end = group.end();
        }

        // Sweep by base: any overlap shows up against the widest range seen so far.
        let mut order: Vec<&EventGroup> =
            self.model.groups.iter().filter(|g| !g.is_empty()).collect();
        order.sort_by_key(|g| g.base);
        let mut widest: Option<&EventGroup> = None;
        for group in order {
            let (base, end) = bounds(group);
            if let Some(prev) = widest {
                let (prev_base, prev_end) = bounds(prev);
                if base < prev_end {
                    return Err(CompileError::RangeCollision {
                        first: prev.name.clone(),
                        first_base: prev_base,
                        first_end: prev_end,
                        second: group.name.clone(),
                        second_base: base,
                        second_end: end,
                    });
                }
                if end <= prev_end {
                    continue;
                }
            }
            widest = Some(group);
        }

        if let Some(group) = self.model.groups.iter().find(|g| g.base == Some(0)) {
            return Err(CompileError::ZeroEventBase {
                group: group.name.clone(),
            });
        }

        for group in &mut self.model.groups {
            let (base, end) = bounds(group);
            group.ids = (base..end).collect();
        }
        info!(
            groups = self.model.groups.len(),
            events = self.model.groups.iter().map(|g| g.ids.len()).sum::<usize>(),
            "event ids allocated"
        );
        Ok(())
    }

    /// Resolves one reference, warning once when it had to be qualified.
    pub fn resolve_event(&mut self, context: &str, reference: &str) -> Result<String> {
        let (qualified, rewritten) = lookup_event(&self.model.groups, context, reference)?;
        if rewritten {
            self.diag.warn(
                WarningKind::AutoQualifiedEvent,
                format!("{context}: event {} resolved to {qualified}", reference.trim()),
            );
        }
        Ok(qualified)
    }

    /// Qualifies every `SUPPRESS_PRINT` entry.
    pub fn resolve_suppressed(&mut self) -> Result<()> {
        let suppressed = std::mem::take(&mut self.model.suppressed);
        let mut resolved = Vec::with_capacity(suppressed.len());
        for reference in &suppressed {
            resolved.push(self.resolve_event("SUPPRESS_PRINT", reference)?);
        }
        self.model.suppressed = resolved;
        Ok(())
    }
}

fn bounds(group: &EventGroup) -> (u32, u32) {
    let base = group.base.unwrap_or_default();
    (base, group.end().unwrap_or(base))
}
