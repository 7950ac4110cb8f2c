use super::Host;
use crate::tables::{SplitKey, TableDescriptor};
use std::io::Write;

pub fn list_tables<H: Host>(host: &mut H) {
    let mut out = host.output();
    let _ = writeln!(out, "{:<22} {:<12} {:<26} DIFF", "TABLE", "PUBLISHED", "SPLIT");
    for table in TableDescriptor::all() {
        let shape: &'static str = table.shape.into();
        let _ = writeln!(
            out,
            "{:<22} {:<12} {:<26} {}",
            table.name,
            shape,
            describe_split(table),
            if table.diffable { "yes" } else { "no" }
        );
    }
}

fn describe_split(table: &TableDescriptor) -> String {
    let Some(rule) = table.split else {
        return "-".to_string();
    };

    let columns = rule.columns.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
    match rule.key {
        SplitKey::LanguageIndex => format!("sentence language of {columns}"),
        SplitKey::Column => format!("value of {columns}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;

    #[test]
    fn test_list_tables() {
        let mut host = TestHost::default();
        list_tables(&mut host);

        let output = host.output_text();
        assert_eq!(output.lines().count(), TableDescriptor::all().len() + 1);
        let links = output.lines().find(|line| line.starts_with("links ")).unwrap();
        assert!(links.contains("archive"));
        assert!(links.contains("sentence language of 0,1"));
        let queries = output.lines().find(|line| line.starts_with("queries ")).unwrap();
        assert!(queries.contains("value of 1"));
        assert!(queries.ends_with("no"));
    }
}
