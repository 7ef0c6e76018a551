// `Untold`: the session facade combining the catalog and the table store
// (`spec.md` §4.7). Grounded on `examples/original_source/front_functions.go`
// — every verb there reappears here, impersonating the `system` principal
// the same way the source's literal `PublicAccessUser{Username: "system",
// PublicToken: []byte{}}` does at this layer.

use crate::config::Config;
use crate::error::{DbError, Result};
use crate::query::query_breakdown;
use crate::rbac::{Group, PublicAccessUser, Role, Scope, SystemDB, User};
use crate::store::{ColumnConfig, Row, DB};

/// Combined catalog + table store, the unit of work a connection handler
/// hands to the serialized core (`spec.md` §5).
pub struct Untold {
    pub system: SystemDB,
    pub database: DB,
    config: Config,
    key: Vec<u8>,
}

fn system_principal() -> PublicAccessUser {
    SystemDB::system_principal()
}

impl Untold {
    /// `Init` — loads or bootstraps the catalog; the table store starts
    /// empty and tables are primed on demand.
    pub fn init(config: Config, key: Vec<u8>, with_tester: bool) -> Result<Self> {
        let system = SystemDB::load(&config, &key, with_tester)?;
        Ok(Self { system, database: DB::new(), config, key })
    }

    /// `Save` — persists the catalog and every resident table.
    pub fn save(&mut self) -> Result<()> {
        self.system.save(&self.config, &self.key)?;
        self.database.save_tables(&self.config, &self.key)?;
        Ok(())
    }

    /// `SaveAndExit` — persists, stripping ephemeral principals first.
    pub fn save_and_exit(mut self) -> Result<()> {
        self.system.close(&self.config, &self.key)?;
        self.database.save_tables(&self.config, &self.key)
    }

    pub fn user_login(&mut self, username: &str, password: &str) -> Result<PublicAccessUser> {
        self.system.user_login(username, password)
    }

    // ---- Table store ----

    pub fn create_database_table(
        &mut self,
        table_name: &str,
        columns: Vec<ColumnConfig>,
        primary_key_name: &str,
    ) -> Result<()> {
        self.database.create_table(table_name, columns, primary_key_name, true)?;
        self.save()
    }

    fn prime_table(&mut self, table_name: &str) -> Result<usize> {
        self.database.prime_table(&self.config, &self.key, table_name)
    }

    pub fn add_table_row(&mut self, table_name: &str, row: Row) -> Result<Row> {
        self.prime_table(table_name)?;
        let table = self.database.table_mut(table_name)?;
        let inserted = table.add_row(row)?;
        self.save()?;
        Ok(inserted)
    }

    pub fn get_table_values(&mut self, table_name: &str, query_string: &str) -> Result<Vec<Row>> {
        self.prime_table(table_name)?;
        let query = query_breakdown(query_string)?;
        let table = self.database.table(table_name)?;
        Ok(table.project_rows(&query.column_names))
    }

    pub fn update_table_row(&mut self, table_name: &str, query_string: &str) -> Result<usize> {
        self.prime_table(table_name)?;
        let query = query_breakdown(query_string)?;
        let updated = self.database.table_mut(table_name)?.update_row(&query)?;
        self.save()?;
        Ok(updated)
    }

    pub fn remove_table_row(&mut self, table_name: &str, query_string: &str) -> Result<usize> {
        self.prime_table(table_name)?;
        let query = query_breakdown(query_string)?;
        let removed = self.database.table_mut(table_name)?.remove_row(&query)?;
        self.save()?;
        Ok(removed)
    }

    pub fn delete_table(&mut self, table_name: &str) -> Result<()> {
        self.prime_table(table_name)?;
        self.database.drop_table(table_name)?;
        let path = self.config.stores_dir().join(format!("{table_name}.dat"));
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    // ---- Catalog ----

    pub fn create_user(&mut self, username: &str, password: &str) -> Result<User> {
        let user = self.system.create_user(username, password, &system_principal())?;
        self.save()?;
        Ok(user)
    }

    pub fn create_group(&mut self, group_name: &str) -> Result<Group> {
        let group = self.system.create_group(group_name, &system_principal())?;
        self.save()?;
        Ok(group)
    }

    pub fn create_role(&mut self, role_name: &str, scope: Scope, policy_ids: Vec<i64>) -> Result<Role> {
        let role = self.system.create_role(role_name, scope, policy_ids, &system_principal())?;
        self.save()?;
        Ok(role)
    }

    pub fn find_group(&mut self, group_name: &str) -> Result<Group> {
        self.system.find_group_by_name(group_name, &system_principal())
    }

    pub fn find_role(&mut self, role_name: &str) -> Result<Role> {
        self.system.find_role_by_name(role_name, &system_principal())
    }

    pub fn add_user_to_group(&mut self, username: &str, group_id: i64) -> Result<()> {
        self.system.assign_user_to_group(username, group_id, &system_principal())?;
        self.save()
    }

    pub fn add_user_to_role(&mut self, username: &str, role_id: i64) -> Result<()> {
        self.system.assign_user_to_role(username, role_id, &system_principal())?;
        self.save()
    }

    pub fn add_group_to_role(&mut self, group_id: i64, role_id: i64) -> Result<()> {
        self.system.assign_group_to_role(group_id, role_id, &system_principal())?;
        self.save()
    }

    pub fn remove_user_from_group(&mut self, username: &str, group_id: i64) -> Result<()> {
        self.system.remove_user_from_group(username, group_id, &system_principal())?;
        self.save()
    }

    pub fn remove_user_from_role(&mut self, username: &str, role_id: i64) -> Result<()> {
        self.system.remove_user_from_role(username, role_id, &system_principal())?;
        self.save()
    }

    pub fn remove_group_from_role(&mut self, group_id: i64, role_id: i64) -> Result<()> {
        self.system.remove_group_from_role(group_id, role_id, &system_principal())?;
        self.save()
    }

    pub fn delete_user(&mut self, username: &str) -> Result<()> {
        self.system.delete_user(username, &system_principal())?;
        self.save()
    }

    pub fn delete_group(&mut self, group_id: i64) -> Result<()> {
        self.system.delete_group(group_id, &system_principal())?;
        self.save()
    }

    pub fn delete_role(&mut self, role_id: i64) -> Result<()> {
        self.system.delete_role(role_id, &system_principal())?;
        self.save()
    }
}

impl std::fmt::Debug for Untold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Untold").field("tables", &self.database.tables.len()).finish()
    }
}
