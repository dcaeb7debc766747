//! Preset resolution against a register snapshot.

use serde::Serialize;
use url::Url;

use crate::error::PresetError;
use crate::presets::{HttpMethod, PresetCatalog, PresetDefinition};
use crate::registers::RegisterStore;

/// A fully-formed outbound request, every parameter sourced from registers.
///
/// Resolution is a pure function of (catalog, register snapshot): resolving
/// the same preset twice against an unchanged store yields byte-identical
/// requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRequest {
    /// The preset this request came from.
    pub preset: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Final URL including substituted path segments and query string.
    pub url: String,
}

/// Resolve a preset against the session's registers.
///
/// Fails closed: if any required register is absent, no partial request is
/// produced and the error lists every missing key.
pub fn resolve(
    catalog: &PresetCatalog,
    name: &str,
    store: &RegisterStore,
) -> Result<ResolvedRequest, PresetError> {
    let def = catalog.get(name).ok_or_else(|| PresetError::Unknown {
        name: name.to_string(),
    })?;

    let missing: Vec<String> = def
        .required_registers
        .iter()
        .filter(|key| !store.contains(key))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(PresetError::RequirementUnmet {
            preset: def.name.clone(),
            missing,
        });
    }

    let url = expand(def, store)?;

    tracing::debug!(preset = %def.name, url = %url, "preset resolved");

    Ok(ResolvedRequest {
        preset: def.name.clone(),
        method: def.template.method,
        url: url.to_string(),
    })
}

/// Substitute register values into the template. Values go in verbatim;
/// there is no agent-supplied override of any substituted field.
fn expand(def: &PresetDefinition, store: &RegisterStore) -> Result<Url, PresetError> {
    let mut pattern = def.template.url_pattern.clone();
    for key in &def.required_registers {
        let placeholder = format!("{{{}}}", key);
        if pattern.contains(&placeholder) {
            // Presence was checked above; required keys are all set.
            let value = store
                .get(key)
                .map(|e| e.value.to_param_string())
                .unwrap_or_default();
            pattern = pattern.replace(&placeholder, &value);
        }
    }

    let mut url = Url::parse(&pattern).map_err(|e| PresetError::Template {
        preset: def.name.clone(),
        reason: format!("invalid URL after substitution: {}", e),
    })?;

    if !def.template.query_params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (param, register) in &def.template.query_params {
            let value = store
                .get(register)
                .map(|e| e.value.to_param_string())
                .unwrap_or_default();
            pairs.append_pair(param, &value);
        }
    }

    Ok(url)
}
