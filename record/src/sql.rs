//! SQL fragment builders shared by records and tables.

use tablerow_core::{Params, Value, quote_ident};

/// Parameter-name prefix for primary-key values in `UPDATE`/`DELETE`/probe
/// `WHERE` clauses, keeping them apart from `SET` values.
pub(crate) const KEY_PREFIX: &str = "key__";

/// Bind-safe parameter name for `column` that is not yet taken in `params`.
///
/// Characters outside `[A-Za-z0-9_]` become `_`; when two columns clean up
/// to the same name (`a b`, `a_b`) the later one gets a numeric suffix.
pub(crate) fn param_name(params: &Params, prefix: &str, column: &str) -> String {
    let cleaned: String = column
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let base = format!("{prefix}{cleaned}");
    if !params.contains_key(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}_{n}");
        if !params.contains_key(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Builds `` `a` = :a AND `b` IS NULL `` and the matching parameters.
pub(crate) fn equality_clause<'a>(
    pairs: impl IntoIterator<Item = (&'a str, Value)>,
    prefix: &str,
) -> (String, Params) {
    let mut clauses = Vec::new();
    let mut params = Params::new();
    for (column, value) in pairs {
        if value.is_null() {
            clauses.push(format!("{} IS NULL", quote_ident(column)));
            continue;
        }
        let name = param_name(&params, prefix, column);
        clauses.push(format!("{} = :{name}", quote_ident(column)));
        params.insert(name, value);
    }
    (clauses.join(" AND "), params)
}

/// Builds `` `a` = :a, `b` = :b ``, adding its values to `params` under
/// names that do not clash with the ones already there.
pub(crate) fn assignment_list(pairs: &[(String, Value)], params: &mut Params) -> String {
    let mut sets = Vec::with_capacity(pairs.len());
    for (column, value) in pairs {
        let name = param_name(params, "", column);
        sets.push(format!("{} = :{name}", quote_ident(column)));
        params.insert(name, value.clone());
    }
    sets.join(", ")
}

/// Builds `` (`a`, `b`) VALUES (:a, :b) ``, or `DEFAULT VALUES` when empty.
pub(crate) fn insert_body(pairs: &[(String, Value)]) -> (String, Params) {
    if pairs.is_empty() {
        return ("DEFAULT VALUES".to_string(), Params::new());
    }
    let mut columns = Vec::with_capacity(pairs.len());
    let mut holders = Vec::with_capacity(pairs.len());
    let mut params = Params::new();
    for (column, value) in pairs {
        let name = param_name(&params, "", column);
        columns.push(quote_ident(column));
        holders.push(format!(":{name}"));
        params.insert(name, value.clone());
    }
    (
        format!("({}) VALUES ({})", columns.join(", "), holders.join(", ")),
        params,
    )
}
