use serde::Serialize;

use crate::cli::OutputFormat;

pub trait TableOutputRow {
    fn get_name(&self) -> String;
    fn get_column_names() -> Vec<String>;
    fn get_row(&self) -> Vec<String>;
}

const COLUMN_SEPARATOR: &str = "   ";

pub fn render_table<T: TableOutputRow>(rows: &[T], with_headers: bool) -> String {
    let headers = T::get_column_names();
    let rows = rows.iter().map(T::get_row).collect::<Vec<_>>();
    let mut widths = vec![0; headers.len()];

    for row in rows.iter().chain(with_headers.then_some(&headers)) {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut output = String::new();

    for row in with_headers.then_some(&headers).into_iter().chain(rows.iter()) {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join(COLUMN_SEPARATOR);

        output.push_str(line.trim_end());
        output.push('\n');
    }

    output
}

pub trait TableOutputDisplay {
    fn print_names(self);
    fn print_table(self);
    fn print_table_with_headers(self);
}

impl<I: IntoIterator<Item = T>, T: TableOutputRow> TableOutputDisplay for I {
    fn print_names(self) {
        for row in self {
            println!("{}", row.get_name());
        }
    }

    fn print_table(self) {
        let rows = self.into_iter().collect::<Vec<_>>();
        print!("{}", render_table(&rows, false));
    }

    fn print_table_with_headers(self) {
        let rows = self.into_iter().collect::<Vec<_>>();
        print!("{}", render_table(&rows, true));
    }
}

pub trait SerializableOutputDisplay {
    fn print_json(&self) -> Result<(), serde_json::Error>;
    fn print_json_pretty(&self) -> Result<(), serde_json::Error>;
    fn print_yaml(&self) -> Result<(), serde_yaml::Error>;
}

impl<T: ?Sized + Serialize> SerializableOutputDisplay for T {
    fn print_json(&self) -> Result<(), serde_json::Error> {
        let output = serde_json::to_string(self)?;
        println!("{output}");

        Ok(())
    }

    fn print_json_pretty(&self) -> Result<(), serde_json::Error> {
        let output = serde_json::to_string_pretty(self)?;
        println!("{output}");

        Ok(())
    }

    fn print_yaml(&self) -> Result<(), serde_yaml::Error> {
        let output = serde_yaml::to_string(self)?;
        print!("{output}");

        Ok(())
    }
}

pub trait CliPrint {
    fn print(self, format: OutputFormat) -> anyhow::Result<()>;
}

impl<T: TableOutputRow + Serialize> CliPrint for Vec<T> {
    fn print(self, format: OutputFormat) -> anyhow::Result<()> {
        match format {
            OutputFormat::Names => self.print_names(),
            OutputFormat::Table => self.print_table(),
            OutputFormat::TableWithHeaders => self.print_table_with_headers(),
            OutputFormat::Json => self.print_json()?,
            OutputFormat::JsonPretty => self.print_json_pretty()?,
            OutputFormat::Yaml => self.print_yaml()?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use kubeprep_macros::TableOutputRow;

    use super::render_table;

    #[derive(TableOutputRow)]
    struct Row {
        #[name_column]
        name: &'static str,
        note: &'static str,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                name: "disable-swap",
                note: "Disabling swap",
            },
            Row {
                name: "smoke-test",
                note: "Running a smoke test",
            },
        ]
    }

    #[test]
    fn table_columns_are_aligned() {
        assert_eq!(
            render_table(&rows(), true),
            "\
NAME           NOTE
disable-swap   Disabling swap
smoke-test     Running a smoke test
"
        );
    }

    #[test]
    fn table_without_headers_only_has_rows() {
        assert_eq!(render_table(&rows(), false).lines().count(), 2);
    }

    #[test]
    fn derived_name_uses_name_column() {
        use super::TableOutputRow;

        assert_eq!(rows()[1].get_name(), "smoke-test");
        assert_eq!(Row::get_column_names(), vec!["NAME", "NOTE"]);
    }
}
