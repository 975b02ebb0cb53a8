use ini::Ini;

pub const OS_RELEASE_PATH: &str = "/etc/os-release";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsRelease {
    pub id: String,
    pub version_id: String,
    pub pretty_name: Option<String>,
}

impl OsRelease {
    pub fn parse(contents: &str) -> Result<Self, String> {
        let parsed = Ini::load_from_str_noescape(contents).map_err(|e| e.to_string())?;
        let properties = parsed.general_section();
        let get = |key: &str| properties.get(key).map(unquote);

        Ok(Self {
            id: get("ID").ok_or("missing ID")?,
            version_id: get("VERSION_ID").ok_or("missing VERSION_ID")?,
            pretty_name: get("PRETTY_NAME"),
        })
    }

    pub fn describe(&self) -> String {
        self.pretty_name
            .clone()
            .unwrap_or_else(|| format!("{} {}", self.id, self.version_id))
    }
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches('"').trim_matches('\'').to_owned()
}
