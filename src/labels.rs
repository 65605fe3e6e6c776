use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

/// A detector class name with the color used to render its detections.
#[derive(Debug, Clone)]
pub struct ClassLabel {
    pub label: String,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

/// Loads the class label table from a `label,r,g,b` CSV file.
pub fn load_class_labels(filepath: &Path) -> io::Result<Vec<ClassLabel>> {
    let file = File::open(filepath)?;
    parse_class_labels(BufReader::new(file))
}

pub fn parse_class_labels(reader: impl BufRead) -> io::Result<Vec<ClassLabel>> {
    let mut class_labels = Vec::new();

    for line_result in reader.lines() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(',').collect();

        if parts.len() != 4 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid line format: {}", line),
            ));
        }

        let label = parts[0].trim().to_string();
        let red: u8 = parts[1]
            .trim()
            .parse()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Invalid red value"))?;
        let green: u8 = parts[2]
            .trim()
            .parse()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Invalid green value"))?;
        let blue: u8 = parts[3]
            .trim()
            .parse()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Invalid blue value"))?;

        class_labels.push(ClassLabel {
            label,
            red,
            green,
            blue,
        });
    }

    Ok(class_labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_lines() {
        let input = b"person, 255, 56, 56\nbicycle, 255, 157, 151\n" as &[u8];
        let labels = parse_class_labels(input).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].label, "person");
        assert_eq!(labels[0].red, 255);
        assert_eq!(labels[1].green, 157);
    }

    #[test]
    fn rejects_missing_fields() {
        let input = b"person, 255, 56\n" as &[u8];
        assert!(parse_class_labels(input).is_err());
    }

    #[test]
    fn rejects_non_numeric_color() {
        let input = b"person, red, 56, 56\n" as &[u8];
        assert!(parse_class_labels(input).is_err());
    }
}
