//! Settings page controller.
//!
//! `OptionsPage` owns the canonical theme collection and reconciles it with
//! the settings hive, the XML exchange format, and the rendering service.
//! Edits never touch the canonical collection directly: the host UI works on
//! the page's `OptionsWindow` working copy and the page applies the recorded
//! delta on commit.

use std::cell::RefCell;

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::host::{ContentTypeProbe, RenderService, SettingsXmlStore, SETTINGS_CATEGORY};
use crate::migrate;
use crate::store::{self, SettingsHive};
use crate::theme::{IndentTheme, ThemeSet};
use crate::xml;

/// Disconnected working copy the host UI edits between `activate` and
/// `apply`. The page itself only ever reads the two pending-change sets.
#[derive(Debug, Default)]
pub struct OptionsWindow {
    /// Ordered snapshot of the canonical collection, cloned at activation.
    pub local_themes: Vec<IndentTheme>,
    /// Content-type label of the active document, when the host could tell.
    pub current_content_type: Option<String>,
    changed: Vec<IndentTheme>,
    deleted: Vec<IndentTheme>,
}

impl OptionsWindow {
    /// Record a created or modified theme, refreshing the local snapshot.
    /// Only the latest pending change per name is kept.
    pub fn stage_change(&mut self, theme: IndentTheme) {
        match self.local_themes.iter_mut().find(|t| t.name == theme.name) {
            Some(local) => *local = theme.clone(),
            None => {
                self.local_themes.push(theme.clone());
                self.local_themes.sort_by(|a, b| a.name.cmp(&b.name));
            }
        }
        self.changed.retain(|t| t.name != theme.name);
        self.changed.push(theme);
    }

    /// Record a removed theme. A delete supersedes any pending change for
    /// the same name, so deleting an edited theme does not resurrect it.
    pub fn stage_delete(&mut self, theme: IndentTheme) {
        self.local_themes.retain(|t| t.name != theme.name);
        self.changed.retain(|t| t.name != theme.name);
        self.deleted.retain(|t| t.name != theme.name);
        self.deleted.push(theme);
    }

    pub fn changed_themes(&self) -> &[IndentTheme] {
        &self.changed
    }

    pub fn deleted_themes(&self) -> &[IndentTheme] {
        &self.deleted
    }

    fn start_session(&mut self, snapshot: Vec<IndentTheme>, content_type: Option<String>) {
        self.local_themes = snapshot;
        self.current_content_type = content_type;
        // A fresh session discards whatever a cancelled one left behind.
        self.changed.clear();
        self.deleted.clear();
    }
}

/// The options-page orchestrator. Generic over the rendering service so
/// hosts inject their live service and tests inject a recorder.
pub struct OptionsPage<S: RenderService> {
    hive: SettingsHive,
    themes: ThemeSet,
    service: S,
    window: OnceCell<RefCell<OptionsWindow>>,
}

impl<S: RenderService> OptionsPage<S> {
    /// Construct the page: run the legacy upgrade, then hand the service an
    /// empty collection and a transient default theme so it never observes
    /// an absent configuration.
    pub fn new(hive: SettingsHive, mut service: S) -> Self {
        migrate::upgrade(&hive);

        let themes = ThemeSet::new();
        service.set_default_theme(IndentTheme::default_theme());
        service.themes_changed(&themes);

        Self {
            hive,
            themes,
            service,
            window: OnceCell::new(),
        }
    }

    /// The edit surface, constructed on first access exactly once.
    pub fn window(&self) -> &RefCell<OptionsWindow> {
        self.window
            .get_or_init(|| RefCell::new(OptionsWindow::default()))
    }

    pub fn themes(&self) -> &ThemeSet {
        &self.themes
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Repopulate the canonical collection from the hive. Per-entry failures
    /// are logged and skipped; the notification fires unconditionally, even
    /// after a partial or empty load.
    pub fn load_from_storage(&mut self) {
        self.themes.clear();
        let mut default_name = None;
        match self.hive.open_root() {
            Ok(Some(root)) => {
                for (name, loaded) in store::load_all(&root) {
                    match loaded {
                        Ok(theme) => self.insert_loaded(theme, &mut default_name),
                        Err(err) => warn!("skipping stored theme {name:?}: {err:#}"),
                    }
                }
            }
            Ok(None) => debug!("no stored themes yet"),
            Err(err) => warn!("loading themes from storage failed: {err:#}"),
        }
        self.service.themes_changed(&self.themes);
    }

    /// Repopulate from the host's settings XML. Parse failures propagate and
    /// leave the current collection untouched.
    pub fn load_from_xml(&mut self, store: &mut dyn SettingsXmlStore) -> Result<()> {
        let text = store.read_xml(SETTINGS_CATEGORY)?;
        let loaded = xml::load_all(&text)?;

        self.themes.clear();
        let mut default_name = None;
        for theme in loaded {
            self.insert_loaded(theme, &mut default_name);
        }
        self.service.themes_changed(&self.themes);
        Ok(())
    }

    /// Insert a freshly loaded theme, keeping at most one default flagged.
    /// When malformed input marks several, the one loaded last wins and the
    /// earlier one is demoted; load order is lexicographic, so the outcome
    /// is deterministic.
    fn insert_loaded(&mut self, theme: IndentTheme, default_name: &mut Option<String>) {
        if theme.is_default {
            if let Some(prev) = default_name.take() {
                if let Some(prev_theme) = self.themes.get_mut(&prev) {
                    prev_theme.is_default = false;
                }
            }
            *default_name = Some(theme.name.clone());
            self.service.set_default_theme(theme.clone());
        }
        self.themes.insert(theme.name.clone(), theme);
    }

    /// Persist the whole collection to the hive. Failures are logged, not
    /// retried; disk state stays stale until the next successful save.
    pub fn save_to_storage(&mut self) {
        if let Err(err) = self.try_save_to_storage() {
            warn!("saving themes to storage failed: {err:#}");
        }
    }

    fn try_save_to_storage(&mut self) -> Result<()> {
        let mut writable = self.hive.open_writable()?;
        store::save_all(writable.root_mut(), self.themes.values());
        writable.commit()
    }

    /// Serialize the whole collection and hand it to the host writer.
    pub fn save_to_xml(&mut self, store: &mut dyn SettingsXmlStore) -> Result<()> {
        let text = xml::save_all(self.themes.values())?;
        store.write_xml(SETTINGS_CATEGORY, &text)
    }

    /// The page became visible: snapshot ordered clones into the working
    /// copy and refresh the content-type label. A probe failure means no
    /// label, never an error.
    pub fn activate(&mut self, probe: &dyn ContentTypeProbe) {
        let snapshot: Vec<IndentTheme> = self.themes.values().cloned().collect();
        let content_type = probe.active_content_type().ok();
        self.window()
            .borrow_mut()
            .start_session(snapshot, content_type);
    }

    /// Commit the working copy's delta to the canonical collection.
    ///
    /// Changed themes upsert by name; deleted themes are removed from both
    /// storage (best-effort) and the collection. Exactly one notification
    /// fires when anything changed, and when deletions are present it is the
    /// one after the deletion pass.
    pub fn apply(&mut self) {
        let (changed, deleted) = {
            let mut window = self.window().borrow_mut();
            (
                std::mem::take(&mut window.changed),
                std::mem::take(&mut window.deleted),
            )
        };

        if !changed.is_empty() {
            for theme in changed {
                if theme.is_default {
                    self.service.set_default_theme(theme.clone());
                }
                self.themes.insert(theme.name.clone(), theme);
            }
            if deleted.is_empty() {
                self.service.themes_changed(&self.themes);
            }
        }

        if !deleted.is_empty() {
            match self.hive.open_writable() {
                Ok(mut writable) => {
                    for theme in &deleted {
                        theme.delete(writable.root_mut());
                        self.themes.remove(&theme.name);
                    }
                    if let Err(err) = writable.commit() {
                        warn!("purging deleted themes from storage failed: {err:#}");
                    }
                }
                Err(err) => {
                    warn!("opening settings hive for deletion failed: {err:#}");
                    for theme in &deleted {
                        self.themes.remove(&theme.name);
                    }
                }
            }
            self.service.themes_changed(&self.themes);
        }
    }

    /// Drop every stored theme, reinstall the built-in default, and notify.
    pub fn reset_settings(&mut self) {
        let default_theme = IndentTheme::default_theme();
        match self.hive.open_writable() {
            Ok(mut writable) => {
                for theme in self.themes.values() {
                    theme.delete(writable.root_mut());
                }
                default_theme.save(writable.root_mut());
                if let Err(err) = writable.commit() {
                    warn!("persisting reset settings failed: {err:#}");
                }
            }
            Err(err) => warn!("opening settings hive for reset failed: {err:#}"),
        }
        self.themes.clear();
        self.themes
            .insert(default_theme.name.clone(), default_theme);
        self.service.themes_changed(&self.themes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ROOT_KEY, LEGACY_KEY};
    use crate::theme::{self, GuideColor, LineStyle, DEFAULT_THEME_NAME};
    use anyhow::anyhow;
    use std::collections::HashMap;
    use std::fs;

    /// Recording stand-in for the rendering service.
    #[derive(Default)]
    struct RecordingService {
        default_theme: Option<IndentTheme>,
        last_seen: ThemeSet,
        notifications: usize,
    }

    impl RenderService for RecordingService {
        fn set_default_theme(&mut self, theme: IndentTheme) {
            self.default_theme = Some(theme);
        }

        fn themes_changed(&mut self, themes: &ThemeSet) {
            self.last_seen = themes.clone();
            self.notifications += 1;
        }
    }

    /// In-memory settings XML store keyed by category.
    #[derive(Default)]
    struct MemoryXmlStore {
        blobs: HashMap<String, String>,
    }

    impl SettingsXmlStore for MemoryXmlStore {
        fn read_xml(&mut self, category: &str) -> Result<String> {
            self.blobs
                .get(category)
                .cloned()
                .ok_or_else(|| anyhow!("no settings stored under {category:?}"))
        }

        fn write_xml(&mut self, category: &str, xml: &str) -> Result<()> {
            self.blobs.insert(category.to_string(), xml.to_string());
            Ok(())
        }
    }

    struct FixedProbe(Option<&'static str>);

    impl ContentTypeProbe for FixedProbe {
        fn active_content_type(&self) -> Result<String> {
            match self.0 {
                Some(label) => Ok(label.to_string()),
                None => Err(anyhow!("no active view")),
            }
        }
    }

    fn temp_hive(test: &str) -> SettingsHive {
        let dir = std::env::temp_dir().join(format!(
            "indent-guides-options-{}-{}",
            test,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        SettingsHive::at_path(dir)
    }

    fn new_page(test: &str) -> OptionsPage<RecordingService> {
        OptionsPage::new(temp_hive(test), RecordingService::default())
    }

    fn named(name: &str) -> IndentTheme {
        IndentTheme::new(name)
    }

    fn named_default(name: &str) -> IndentTheme {
        let mut theme = IndentTheme::new(name);
        theme.is_default = true;
        theme
    }

    #[test]
    fn construction_gives_the_service_a_usable_configuration() {
        let page = new_page("construct");

        let service = page.service();
        assert_eq!(
            service.default_theme.as_ref().map(|t| t.name.as_str()),
            Some(DEFAULT_THEME_NAME)
        );
        assert!(service.last_seen.is_empty());
        assert_eq!(service.notifications, 1);
    }

    #[test]
    fn construction_runs_the_legacy_upgrade() {
        let hive = temp_hive("construct-upgrade");
        {
            let mut writable = hive.open_writable().unwrap();
            writable.tree_mut().remove_child(ROOT_KEY);
            let record = writable.tree_mut().create_child(LEGACY_KEY);
            record.set(theme::KEY_NAME, "Imported");
            writable.commit().unwrap();
        }

        let mut page = OptionsPage::new(hive, RecordingService::default());
        page.load_from_storage();

        assert!(page.themes().contains_key("Imported"));
        assert_eq!(
            page.service().default_theme.as_ref().unwrap().name,
            "Imported"
        );
    }

    #[test]
    fn empty_root_loads_to_an_empty_collection() {
        // Fresh install whose root key exists but holds nothing.
        let hive = temp_hive("empty-root");
        hive.open_writable().unwrap().commit().unwrap();

        let mut page = OptionsPage::new(hive, RecordingService::default());
        page.load_from_storage();

        assert!(page.themes().is_empty());
        // Constructor notification plus the unconditional load notification.
        assert_eq!(page.service().notifications, 2);
        // The transient constructor-time default survives an empty load.
        assert_eq!(
            page.service().default_theme.as_ref().unwrap().name,
            DEFAULT_THEME_NAME
        );
    }

    #[test]
    fn load_skips_malformed_entries_and_keeps_the_rest() {
        let hive = temp_hive("partial-load");
        {
            let mut writable = hive.open_writable().unwrap();
            named("Good").save(writable.root_mut());
            writable
                .root_mut()
                .create_child("Bad")
                .set(theme::KEY_LINE_COLOR, "nope");
            writable.commit().unwrap();
        }

        let mut page = OptionsPage::new(hive, RecordingService::default());
        page.load_from_storage();

        assert_eq!(page.themes().len(), 1);
        assert!(page.themes().contains_key("Good"));
    }

    #[test]
    fn lexicographically_last_default_wins_deterministically() {
        let hive = temp_hive("default-tiebreak");
        {
            let mut writable = hive.open_writable().unwrap();
            named_default("Alpha").save(writable.root_mut());
            named_default("Beta").save(writable.root_mut());
            writable.commit().unwrap();
        }

        let mut page = OptionsPage::new(hive, RecordingService::default());
        page.load_from_storage();

        assert_eq!(page.service().default_theme.as_ref().unwrap().name, "Beta");
        // The losing theme is demoted so the collection keeps one default.
        let flagged: Vec<_> = page
            .themes()
            .values()
            .filter(|t| t.is_default)
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(flagged, vec!["Beta"]);
    }

    #[test]
    fn prior_default_is_kept_when_none_is_flagged() {
        let hive = temp_hive("no-default-flagged");
        {
            let mut writable = hive.open_writable().unwrap();
            named("Plain").save(writable.root_mut());
            writable.commit().unwrap();
        }

        let mut page = OptionsPage::new(hive, RecordingService::default());
        page.load_from_storage();

        assert_eq!(
            page.service().default_theme.as_ref().unwrap().name,
            DEFAULT_THEME_NAME
        );
    }

    #[test]
    fn xml_round_trip_through_the_host_store() {
        let mut page = new_page("xml-roundtrip");
        let mut store = MemoryXmlStore::default();

        page.window().borrow_mut().stage_change(named("Dark"));
        page.window().borrow_mut().stage_change(named_default("Light"));
        page.apply();
        page.save_to_xml(&mut store).unwrap();

        let mut restored = new_page("xml-roundtrip-restore");
        restored.load_from_xml(&mut store).unwrap();

        assert_eq!(restored.themes(), page.themes());
        assert_eq!(
            restored.service().default_theme.as_ref().unwrap().name,
            "Light"
        );
    }

    #[test]
    fn failed_xml_import_propagates_and_changes_nothing() {
        let mut page = new_page("xml-import-fails");
        page.window().borrow_mut().stage_change(named("Keep"));
        page.apply();

        let mut store = MemoryXmlStore::default();
        store
            .write_xml(SETTINGS_CATEGORY, "<IndentGuide><Theme")
            .unwrap();

        assert!(page.load_from_xml(&mut store).is_err());
        assert!(page.themes().contains_key("Keep"));
    }

    #[test]
    fn activate_snapshots_ordered_clones_and_the_content_type() {
        let mut page = new_page("activate");
        page.window().borrow_mut().stage_change(named("Zed"));
        page.window().borrow_mut().stage_change(named("Abb"));
        page.apply();

        page.activate(&FixedProbe(Some("Plain Text")));

        let window = page.window().borrow();
        let names: Vec<_> = window.local_themes.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Abb", "Zed"]);
        assert_eq!(window.current_content_type.as_deref(), Some("Plain Text"));
        assert!(window.changed_themes().is_empty());
        assert!(window.deleted_themes().is_empty());
    }

    #[test]
    fn activate_swallows_probe_failures() {
        let mut page = new_page("activate-no-view");
        page.activate(&FixedProbe(None));
        assert!(page.window().borrow().current_content_type.is_none());
    }

    #[test]
    fn apply_with_changes_only_notifies_once() {
        let mut page = new_page("apply-changes");
        let before = page.service().notifications;

        page.window().borrow_mut().stage_change(named("One"));
        page.window().borrow_mut().stage_change(named("Two"));
        page.apply();

        assert_eq!(page.service().notifications, before + 1);
        assert_eq!(page.themes().len(), 2);
    }

    #[test]
    fn apply_with_nothing_staged_does_not_notify() {
        let mut page = new_page("apply-noop");
        let before = page.service().notifications;

        page.apply();

        assert_eq!(page.service().notifications, before);
    }

    #[test]
    fn apply_with_changes_and_deletions_notifies_exactly_once() {
        let mut page = new_page("apply-arity");
        page.window().borrow_mut().stage_change(named("Doomed"));
        page.window().borrow_mut().stage_change(named("Kept"));
        page.apply();
        page.save_to_storage();

        let before = page.service().notifications;
        {
            let mut window = page.window().borrow_mut();
            window.stage_change(named("Edited"));
            window.stage_delete(named("Doomed"));
        }
        page.apply();

        assert_eq!(page.service().notifications, before + 1);
        assert!(page.themes().contains_key("Edited"));
        assert!(!page.themes().contains_key("Doomed"));
        // The notification the service saw is the post-deletion state.
        assert!(!page.service().last_seen.contains_key("Doomed"));
    }

    #[test]
    fn deleting_a_theme_with_no_storage_entry_still_removes_it() {
        let mut page = new_page("delete-tolerance");
        page.window().borrow_mut().stage_change(named("Ghost"));
        page.apply();
        // Never saved to storage, so the hive has no entry for it.

        let before = page.service().notifications;
        page.window().borrow_mut().stage_delete(named("Ghost"));
        page.apply();

        assert!(!page.themes().contains_key("Ghost"));
        assert_eq!(page.service().notifications, before + 1);
    }

    #[test]
    fn apply_reconciles_storage_collection_and_default() {
        // Scenario: start with Dark and Light (default); delete Dark, demote
        // Light, add Bright as the new default.
        let hive = temp_hive("scenario-mixed");
        {
            let mut writable = hive.open_writable().unwrap();
            named("Dark").save(writable.root_mut());
            named_default("Light").save(writable.root_mut());
            writable.commit().unwrap();
        }

        let mut page = OptionsPage::new(hive.clone(), RecordingService::default());
        page.load_from_storage();
        page.activate(&FixedProbe(None));

        let before = page.service().notifications;
        {
            let mut window = page.window().borrow_mut();
            let mut light = named("Light");
            light.is_default = false;
            window.stage_change(light);
            window.stage_change(named_default("Bright"));
            window.stage_delete(named("Dark"));
        }
        page.apply();
        page.save_to_storage();

        assert_eq!(page.service().notifications, before + 1);
        assert_eq!(
            page.themes().keys().collect::<Vec<_>>(),
            vec!["Bright", "Light"]
        );
        assert_eq!(
            page.service().default_theme.as_ref().unwrap().name,
            "Bright"
        );

        let root = hive.open_root().unwrap().unwrap();
        let mut stored: Vec<_> = root.child_names().collect();
        stored.sort_unstable();
        assert_eq!(stored, vec!["Bright", "Light"]);
    }

    #[test]
    fn reset_leaves_exactly_one_stored_default() {
        let hive = temp_hive("reset");
        {
            let mut writable = hive.open_writable().unwrap();
            named("Dark").save(writable.root_mut());
            named_default("Light").save(writable.root_mut());
            writable.commit().unwrap();
        }

        let mut page = OptionsPage::new(hive.clone(), RecordingService::default());
        page.load_from_storage();

        let before = page.service().notifications;
        page.reset_settings();

        assert_eq!(page.service().notifications, before + 1);
        assert_eq!(
            page.themes().keys().collect::<Vec<_>>(),
            vec![DEFAULT_THEME_NAME]
        );

        let root = hive.open_root().unwrap().unwrap();
        assert_eq!(
            root.child_names().collect::<Vec<_>>(),
            vec![DEFAULT_THEME_NAME]
        );
        let stored = IndentTheme::load(&root, DEFAULT_THEME_NAME).unwrap();
        assert_eq!(stored, IndentTheme::default_theme());
    }

    #[test]
    fn staged_edit_then_delete_does_not_resurrect_the_theme() {
        let mut page = new_page("edit-then-delete");
        {
            let mut window = page.window().borrow_mut();
            let mut theme = named("Flicker");
            theme.line_format.line_color = GuideColor::rgb(1, 2, 3);
            window.stage_change(theme);
            window.stage_delete(named("Flicker"));
        }
        page.apply();

        assert!(!page.themes().contains_key("Flicker"));
    }

    #[test]
    fn repeated_stage_changes_keep_only_the_latest() {
        let mut window = OptionsWindow::default();
        let mut first = named("Twice");
        first.line_format.line_style = LineStyle::Solid;
        let mut second = named("Twice");
        second.line_format.line_style = LineStyle::Dashed;

        window.stage_change(first);
        window.stage_change(second.clone());

        assert_eq!(window.changed_themes(), &[second]);
        assert_eq!(window.local_themes.len(), 1);
    }
}
