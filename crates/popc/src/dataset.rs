use snafu::prelude::*;
use std::fmt;
use std::io::BufRead;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum DatasetError {
    #[snafu(display("dataset must have at least one attribute"))]
    NoAttributes,

    #[snafu(display("dataset must have at least one instance"))]
    NoInstances,

    #[snafu(display("missing header line with attribute names"))]
    MissingHeader,

    #[snafu(display("attribute name in column {column} is empty"))]
    EmptyAttributeName { column: usize },

    #[snafu(display("got {found} attribute names for {expected} attributes"))]
    NameCountMismatch { expected: usize, found: usize },

    #[snafu(display("row {row} has {found} values, expected {expected}"))]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[snafu(display(
        "inconsistent number of columns on line {line}: expected {expected}, found {found}"
    ))]
    RaggedLine {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[snafu(display(
        "invalid attribute value {value:?} at line {line} for column {column} - must be 0 or 1"
    ))]
    InvalidValue {
        line: usize,
        column: usize,
        value: String,
    },

    #[snafu(display("failed to read dataset"))]
    Io { source: std::io::Error },
}

/// Dense binary matrix of records × attributes.
///
/// Immutable once built. Besides the row-major values, it keeps the number of
/// positive records per attribute and, for every record, the ascending list of
/// attributes it has set, so scoring never has to look at zero values.
#[derive(Debug, Clone)]
pub struct Dataset {
    names: Vec<String>,
    values: Vec<bool>,
    num_instances: usize,
    positive_counts: Vec<usize>,
    // CSR layout: attributes set in record i are present[offsets[i]..offsets[i + 1]]
    present_offsets: Vec<usize>,
    present: Vec<usize>,
}

impl Dataset {
    fn from_parts(names: Vec<String>, values: Vec<bool>) -> Self {
        let num_attributes = names.len();
        assert!(num_attributes > 0);
        assert!(values.len().is_multiple_of(num_attributes));

        let num_instances = values.len() / num_attributes;
        let mut positive_counts = vec![0usize; num_attributes];
        let mut present_offsets = Vec::with_capacity(num_instances + 1);
        let mut present = Vec::new();

        present_offsets.push(0);
        for row in values.chunks_exact(num_attributes) {
            for (attribute, _) in row.iter().enumerate().filter(|(_, v)| **v) {
                positive_counts[attribute] += 1;
                present.push(attribute);
            }
            present_offsets.push(present.len());
        }

        Dataset {
            names,
            values,
            num_instances,
            positive_counts,
            present_offsets,
            present,
        }
    }

    /// Build a dataset from in-memory rows. Attributes are named `a0`, `a1`, ….
    pub fn from_rows<R: AsRef<[bool]>>(rows: &[R]) -> Result<Self, DatasetError> {
        ensure!(!rows.is_empty(), NoInstancesSnafu);
        let num_attributes = rows[0].as_ref().len();
        ensure!(num_attributes > 0, NoAttributesSnafu);

        let mut values = Vec::with_capacity(rows.len() * num_attributes);
        for (row, r) in rows.iter().enumerate() {
            let r = r.as_ref();
            ensure!(
                r.len() == num_attributes,
                RaggedRowSnafu {
                    row,
                    expected: num_attributes,
                    found: r.len()
                }
            );
            values.extend_from_slice(r);
        }

        let names = (0..num_attributes).map(|a| format!("a{a}")).collect();
        Ok(Self::from_parts(names, values))
    }

    pub fn with_names(mut self, names: Vec<String>) -> Result<Self, DatasetError> {
        ensure!(
            names.len() == self.num_attributes(),
            NameCountMismatchSnafu {
                expected: self.num_attributes(),
                found: names.len()
            }
        );
        check_names(&names)?;
        self.names = names;
        Ok(self)
    }

    /// Read delimiter-separated 0/1 data preceded by a single header line of
    /// attribute names.
    ///
    /// Line numbers in errors refer to the input, so the first data row is line 2.
    pub fn from_reader(reader: impl BufRead, delimiter: char) -> Result<Self, DatasetError> {
        let mut lines = reader.lines();

        let header = lines.next().context(MissingHeaderSnafu)?.context(IoSnafu)?;
        let header = header.strip_suffix('\r').unwrap_or(&header);
        ensure!(!header.is_empty(), NoAttributesSnafu);
        let names: Vec<String> = header.split(delimiter).map(str::to_owned).collect();
        check_names(&names)?;
        let num_attributes = names.len();

        let mut values = Vec::with_capacity(256 * num_attributes);
        let mut first_blank_line = None;

        for (i, line) in lines.enumerate() {
            let line_num = i + 2;
            let line = line.context(IoSnafu)?;
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if line.is_empty() {
                first_blank_line.get_or_insert(line_num);
                continue;
            }
            // Blank lines are only tolerated at the very end of the input
            if let Some(blank) = first_blank_line {
                return RaggedLineSnafu {
                    line: blank,
                    expected: num_attributes,
                    found: 0usize,
                }
                .fail();
            }

            let fields: Vec<&str> = line.split(delimiter).collect();
            ensure!(
                fields.len() == num_attributes,
                RaggedLineSnafu {
                    line: line_num,
                    expected: num_attributes,
                    found: fields.len()
                }
            );

            for (column, field) in fields.into_iter().enumerate() {
                let value = match field {
                    "0" => false,
                    "1" => true,
                    other => {
                        return InvalidValueSnafu {
                            line: line_num,
                            column: column + 1,
                            value: other,
                        }
                        .fail();
                    }
                };
                values.push(value);
            }
        }

        ensure!(!values.is_empty(), NoInstancesSnafu);
        values.shrink_to_fit();
        Ok(Self::from_parts(names, values))
    }

    #[inline]
    pub fn num_instances(&self) -> usize {
        self.num_instances
    }

    #[inline]
    pub fn num_attributes(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn value(&self, instance: usize, attribute: usize) -> bool {
        assert!(instance < self.num_instances, "instance {instance} out of range");
        assert!(attribute < self.num_attributes(), "attribute {attribute} out of range");
        self.values[instance * self.num_attributes() + attribute]
    }

    pub fn row(&self, instance: usize) -> &[bool] {
        assert!(instance < self.num_instances, "instance {instance} out of range");
        let n = self.num_attributes();
        &self.values[instance * n..(instance + 1) * n]
    }

    /// Number of records in the whole dataset with `attribute` set.
    #[inline]
    pub fn positive_count(&self, attribute: usize) -> usize {
        self.positive_counts[attribute]
    }

    /// Ascending indices of the attributes set in `instance`.
    #[inline]
    pub fn attributes_set(&self, instance: usize) -> &[usize] {
        assert!(instance < self.num_instances, "instance {instance} out of range");
        &self.present[self.present_offsets[instance]..self.present_offsets[instance + 1]]
    }

    pub fn attribute_name(&self, attribute: usize) -> &str {
        &self.names[attribute]
    }
}

/// Names may not be empty, so repeated delimiters in a header are an error
/// rather than an unnamed column.
fn check_names(names: &[String]) -> Result<(), DatasetError> {
    match names.iter().position(String::is_empty) {
        Some(column) => EmptyAttributeNameSnafu { column: column + 1 }.fail(),
        None => Ok(()),
    }
}

/// Writes the dataset back out as tab-separated values with a header line.
impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.names.join("\t"))?;
        for row in self.values.chunks_exact(self.num_attributes()) {
            for (i, &v) in row.iter().enumerate() {
                if i > 0 {
                    f.write_str("\t")?;
                }
                f.write_str(if v { "1" } else { "0" })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
