use crate::data::model::Polarization;

/// Kind of file found in the capture directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Ave,
    Maxh,
    Other,
}

/// Result of classifying one directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified {
    pub file_type: FileType,
    pub polarization: Option<Polarization>,
}

impl Classified {
    pub const OTHER: Classified = Classified {
        file_type: FileType::Other,
        polarization: None,
    };

    /// The polarization of an `ave`/`maxh` capture; `None` for anything else.
    pub fn capture(&self) -> Option<(FileType, Polarization)> {
        match (self.file_type, self.polarization) {
            (FileType::Other, _) | (_, None) => None,
            (file_type, Some(pol)) => Some((file_type, pol)),
        }
    }
}

/// Filename convention of the spectrum monitor.
pub trait CaptureNaming {
    fn classify(&self, file_name: &str) -> Classified;
    fn extract_time_stamp(&self, file_name: &str) -> String;
}

/// `<time_stamp>.<ave|maxh>.<E|N>`, e.g. `20171018-120000.maxh.N`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DottedNaming;

impl CaptureNaming for DottedNaming {
    fn classify(&self, file_name: &str) -> Classified {
        let parts: Vec<&str> = file_name.split('.').collect();
        let [stamp, kind, pol] = parts.as_slice() else {
            return Classified::OTHER;
        };
        if stamp.is_empty() {
            return Classified::OTHER;
        }
        let file_type = match kind.to_ascii_lowercase().as_str() {
            "ave" => FileType::Ave,
            "maxh" => FileType::Maxh,
            _ => return Classified::OTHER,
        };
        match pol.parse::<Polarization>() {
            Ok(pol) => Classified {
                file_type,
                polarization: Some(pol),
            },
            Err(_) => Classified::OTHER,
        }
    }

    fn extract_time_stamp(&self, file_name: &str) -> String {
        file_name.split('.').next().unwrap_or_default().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_captures() {
        let c = DottedNaming.classify("20171018-120000.ave.E");
        assert_eq!(c.capture(), Some((FileType::Ave, Polarization::E)));
        let c = DottedNaming.classify("20171018-120000.MAXH.N");
        assert_eq!(c.capture(), Some((FileType::Maxh, Polarization::N)));
    }

    #[test]
    fn test_classify_other() {
        for name in [
            "20171018-120000.ridz",
            "header.rids",
            "x.ave.Q",
            ".ave.E",
            "a.b.ave.E",
            "20171018.cal.E",
        ] {
            assert_eq!(DottedNaming.classify(name), Classified::OTHER, "{name}");
        }
    }

    #[test]
    fn test_extract_time_stamp() {
        assert_eq!(DottedNaming.extract_time_stamp("20171018-120000.ave.E"), "20171018-120000");
        assert_eq!(DottedNaming.extract_time_stamp("plain"), "plain");
    }
}
