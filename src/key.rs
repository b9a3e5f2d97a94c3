//! Flattening of a metric identity (name parts + labels) into the name we
//! expose and the key we store it under.

/// The result of flattening a metric identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatKey {
    /// Name parts joined with `_`, safe to use as an exposition identifier.
    pub name: String,
    /// `name` followed by `;label=value` for every label, in caller order.
    pub key: String,
}

fn is_forbidden(c: char) -> bool {
    matches!(c, ' ' | '.' | '=' | '-' | '/')
}

/// Flatten `parts` and `labels` into a [`FlatKey`].
///
/// Labels are **not** sorted. `[("a", "1"), ("b", "2")]` and
/// `[("b", "2"), ("a", "1")]` produce different keys and therefore different
/// registry entries, callers must report labels in a consistent order.
/// Separators inside label values are not escaped either.
pub fn flatten_key<S, K, V>(parts: &[S], labels: &[(K, V)]) -> FlatKey
where
    S: AsRef<str>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut name = String::with_capacity(parts.iter().map(|p| p.as_ref().len() + 1).sum());
    for (idx, part) in parts.iter().enumerate() {
        if idx > 0 {
            name.push('_');
        }
        name.extend(
            part.as_ref()
                .chars()
                .map(|c| if is_forbidden(c) { '_' } else { c }),
        );
    }

    let mut key = name.clone();
    for (label, value) in labels {
        key.push(';');
        key.push_str(label.as_ref());
        key.push('=');
        key.push_str(value.as_ref());
    }
    FlatKey { name, key }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_LABELS: &[(&str, &str)] = &[];

    #[test]
    fn replaces_forbidden_chars() {
        let flat = flatten_key(&["my", "app.service"], NO_LABELS);
        assert_eq!(flat.name, "my_app_service");
        assert_eq!(flat.key, "my_app_service");

        let flat = flatten_key(&["a b", "c=d-e/f"], NO_LABELS);
        assert_eq!(flat.name, "a_b_c_d_e_f");
    }

    #[test]
    fn appends_labels_in_order() {
        let flat = flatten_key(&["req", "latency"], &[("method", "GET"), ("code", "200")]);
        assert_eq!(flat.name, "req_latency");
        assert_eq!(flat.key, "req_latency;method=GET;code=200");
    }

    #[test]
    fn deterministic() {
        let labels = [("service", "api"), ("zone", "us-east-1")];
        let first = flatten_key(&["consul", "rpc.query"], &labels);
        for _ in 0..10 {
            assert_eq!(flatten_key(&["consul", "rpc.query"], &labels), first);
        }
    }

    #[test]
    fn label_order_matters() {
        let ab = flatten_key(&["hits"], &[("a", "1"), ("b", "2")]);
        let ba = flatten_key(&["hits"], &[("b", "2"), ("a", "1")]);
        assert_eq!(ab.name, ba.name);
        assert_ne!(ab.key, ba.key);
    }

    #[test]
    fn owned_inputs() {
        let parts = vec![String::from("owned"), String::from("name")];
        let labels = vec![(String::from("k"), String::from("v"))];
        assert_eq!(flatten_key(parts.as_slice(), labels.as_slice()).key, "owned_name;k=v");
    }

    #[test]
    fn duplicate_labels_kept() {
        let flat = flatten_key(&["dup"], &[("k", "1"), ("k", "1")]);
        assert_eq!(flat.key, "dup;k=1;k=1");
    }
}
