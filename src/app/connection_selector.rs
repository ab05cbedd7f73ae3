use anyhow::Result;

use sqlpilot::config::ConnectionProfile;

use crate::app::{App, AppMode, ConnectionField};

// Saved-profile list: choosing, creating and forgetting connections.
impl App {
    pub fn selector_up(&mut self) {
        self.selected_profile = self.selected_profile.saturating_sub(1);
    }

    pub fn selector_down(&mut self) {
        let last = self.config.connections.len().saturating_sub(1);
        self.selected_profile = (self.selected_profile + 1).min(last);
    }

    fn edit_profile(&mut self, profile: &ConnectionProfile, focus: ConnectionField) {
        self.host = profile.host.clone();
        self.port = profile.port.clone();
        self.database = profile.database.clone();
        self.user = profile.user.clone();
        self.password.clear();
        self.clear_error();
        self.mode = AppMode::ConnectionEdit;
        self.connection_field = focus;
    }

    /// Open the selected profile with only the password left to type.
    pub fn load_selected_profile(&mut self) {
        if let Some(profile) = self.config.connections.get(self.selected_profile).cloned() {
            self.edit_profile(&profile, ConnectionField::Password);
        }
    }

    pub fn create_new_connection(&mut self) {
        self.edit_profile(&ConnectionProfile::new(String::new()), ConnectionField::Host);
    }

    pub fn delete_selected_profile(&mut self) -> Result<()> {
        if self.selected_profile >= self.config.connections.len() {
            return Ok(());
        }
        let removed = self.config.connections.remove(self.selected_profile);
        self.selector_up();
        self.config.save()?;
        self.set_status(format!("Forgot {}", removed.name));
        Ok(())
    }
}
