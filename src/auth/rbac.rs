/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Roles are stored on the user row and copied into the access token. Every guarded
 * operation names an [`Action`]; [`Action::allowed_roles`] is the single permission table.
 */

use sea_orm::entity::prelude::*;
use sea_orm::Iterable;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Role carried by every user and every caller.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[sea_orm(string_value = "super_admin")]
    SuperAdmin,
    #[sea_orm(string_value = "company_admin")]
    CompanyAdmin,
    #[sea_orm(string_value = "warehouse_manager")]
    WarehouseManager,
    #[sea_orm(string_value = "inventory_manager")]
    InventoryManager,
    #[sea_orm(string_value = "picker")]
    Picker,
    #[sea_orm(string_value = "packer")]
    Packer,
    #[sea_orm(string_value = "viewer")]
    Viewer,
}

impl Role {
    pub fn is_super_admin(self) -> bool {
        self == Role::SuperAdmin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::iter()
            .find(|role| role.to_value() == s)
            .ok_or_else(|| format!("unknown role '{}'", s))
    }
}

/// Operations subject to a role check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ReadOrders,
    ManageOrders,
    AssignWork,
    Pick,
    Pack,
    ManageShipments,
    DeliverShipments,
    ManageReturns,
    Refund,
    ReadStock,
    AdjustStock,
    ManageUsers,
}

const ALL_ROLES: &[Role] = &[
    Role::SuperAdmin,
    Role::CompanyAdmin,
    Role::WarehouseManager,
    Role::InventoryManager,
    Role::Picker,
    Role::Packer,
    Role::Viewer,
];

impl Action {
    pub fn allowed_roles(self) -> &'static [Role] {
        use Role::*;
        match self {
            Action::ReadOrders | Action::ReadStock => ALL_ROLES,
            Action::ManageOrders | Action::Refund | Action::ManageUsers => {
                &[SuperAdmin, CompanyAdmin]
            }
            Action::AssignWork | Action::DeliverShipments => {
                &[SuperAdmin, CompanyAdmin, WarehouseManager]
            }
            Action::Pick => &[SuperAdmin, CompanyAdmin, WarehouseManager, Picker],
            Action::Pack => &[SuperAdmin, CompanyAdmin, WarehouseManager, Packer],
            Action::ManageShipments => &[SuperAdmin, CompanyAdmin, WarehouseManager, Packer],
            Action::ManageReturns | Action::AdjustStock => {
                &[SuperAdmin, CompanyAdmin, WarehouseManager, InventoryManager]
            }
        }
    }

    pub fn allows(self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Action::ManageOrders, Role::CompanyAdmin, true)]
    #[case(Action::ManageOrders, Role::WarehouseManager, false)]
    #[case(Action::Pack, Role::Packer, true)]
    #[case(Action::Pack, Role::Picker, false)]
    #[case(Action::Pick, Role::Picker, true)]
    #[case(Action::Refund, Role::InventoryManager, false)]
    #[case(Action::ReadOrders, Role::Viewer, true)]
    #[case(Action::AdjustStock, Role::Viewer, false)]
    fn permission_table(#[case] action: Action, #[case] role: Role, #[case] expected: bool) {
        assert_eq!(action.allows(role), expected);
    }

    #[test]
    fn super_admin_is_allowed_everything() {
        let actions = [
            Action::ReadOrders,
            Action::ManageOrders,
            Action::AssignWork,
            Action::Pick,
            Action::Pack,
            Action::ManageShipments,
            Action::DeliverShipments,
            Action::ManageReturns,
            Action::Refund,
            Action::ReadStock,
            Action::AdjustStock,
            Action::ManageUsers,
        ];
        for action in actions {
            assert!(action.allows(Role::SuperAdmin), "{:?}", action);
        }
    }

    #[test]
    fn roles_parse_from_their_stored_value() {
        for role in Role::iter() {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("admin".parse::<Role>().is_err());
    }
}
