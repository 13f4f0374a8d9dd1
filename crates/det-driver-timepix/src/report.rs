//! Diagnostic report output.
//!
//! Read-only: renders the current parameter values into a
//! [`DiagnosticSink`], never mutating driver state.

use det_core::handler::DiagnosticSink;
use det_core::params::{ids, ParameterCache};

const RULE: &str =
    " -------------------------------------------------------------------\n";

/// Write the device block (above the detail threshold) followed by a
/// generic dump of every cached parameter.
pub(crate) fn write_report(
    cache: &ParameterCache,
    name: &str,
    sink: &mut dyn DiagnosticSink,
    details: i32,
) {
    if details > 0 {
        let width = cache.get_int(ids::SIZE_X).unwrap_or(0);
        let height = cache.get_int(ids::SIZE_Y).unwrap_or(0);
        let model = cache.get_text(ids::MODEL).unwrap_or("");
        let server = cache.get_text(ids::SERVER_URL).unwrap_or("");

        sink.write(RULE);
        sink.write(&format!(" Connected Device Information ({})\n", name));
        sink.write(&format!(" Server URL            ->      {}\n", server));
        sink.write(&format!(" Model                 ->      {}\n", model));
        sink.write(&format!(" Image Width           ->      {}\n", width));
        sink.write(&format!(" Image Height          ->      {}\n", height));
        sink.write(RULE);
        sink.write("\n");
    }

    let mut entries: Vec<_> = cache.values().iter().collect();
    entries.sort_by_key(|(id, _)| **id);
    for (id, value) in entries {
        sink.write(&format!(" param {:>4} = {}\n", id, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use det_core::params::ParamValue;

    fn sized_cache() -> ParameterCache {
        let mut cache = ParameterCache::new();
        cache.create(ids::SIZE_X, ParamValue::Int(448));
        cache.create(ids::SIZE_Y, ParamValue::Int(512));
        cache.create(ids::MODEL, ParamValue::Text("TPX3".into()));
        cache.create(ids::SERVER_URL, ParamValue::Text("http://d:8080".into()));
        cache
    }

    #[test]
    fn detail_block_appears_above_threshold() {
        let cache = sized_cache();
        let mut out = String::new();
        write_report(&cache, "det1", &mut out, 1);

        assert!(out.contains("Connected Device Information (det1)"));
        assert!(out.contains("Image Width           ->      448"));
        assert!(out.contains("Image Height          ->      512"));
    }

    #[test]
    fn generic_dump_appears_at_any_level() {
        let cache = sized_cache();
        let mut out = String::new();
        write_report(&cache, "det1", &mut out, 0);

        assert!(!out.contains("Connected Device Information"));
        assert!(out.contains(&format!(" param  {} = 448", ids::SIZE_X)));
    }
}
