/// Which form element receives key input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    /// Path to the `custom_nodes` directory.
    #[default]
    Path,
    /// Repository URLs, one per line.
    Repos,
    ValidateButton,
    SaveButton,
    InstallButton,
}

impl Focus {
    const ORDER: [Focus; 5] = [
        Focus::Path,
        Focus::Repos,
        Focus::ValidateButton,
        Focus::SaveButton,
        Focus::InstallButton,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Focus::Path => "PATH",
            Focus::Repos => "REPOS",
            Focus::ValidateButton => "VALIDATE",
            Focus::SaveButton => "SAVE",
            Focus::InstallButton => "INSTALL",
        }
    }

    pub fn next(self) -> Self {
        let idx = self.index();
        Self::ORDER[(idx + 1) % Self::ORDER.len()]
    }

    pub fn prev(self) -> Self {
        let idx = self.index();
        Self::ORDER[(idx + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }

    fn index(self) -> usize {
        Self::ORDER
            .iter()
            .position(|f| *f == self)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focus_cycles_both_ways() {
        assert_eq!(Focus::Path.next(), Focus::Repos);
        assert_eq!(Focus::InstallButton.next(), Focus::Path);
        assert_eq!(Focus::Path.prev(), Focus::InstallButton);
    }
}
