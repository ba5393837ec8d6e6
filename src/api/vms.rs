use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{decode, ApiClient, NO_BODY};
use crate::error::{truncate_body, Error, HttpFailure, Result};
use crate::models::{NewVm, VirtualMachine, VmUpdate};

impl ApiClient {
    /// GET `/vm`.
    pub fn get_vms(&self) -> Result<Vec<VirtualMachine>> {
        info!(base_url = %self.base_url, "fetching VMs");
        let vms: Vec<VirtualMachine> = self
            .send_json(Method::GET, "/vm", NO_BODY, None)
            .map_err(Error::VmsFetch)?;
        info!(count = vms.len(), "fetched VMs");
        debug!(vm_ids = ?vms.iter().take(5).map(|v| v.id).collect::<Vec<_>>(), "first VMs");
        Ok(vms)
    }

    /// GET `/vm/{id}`.
    pub fn get_vm(&self, vm_id: i64) -> Result<VirtualMachine> {
        self.send_json(Method::GET, &format!("/vm/{vm_id}"), NO_BODY, None)
            .map_err(Error::VmsFetch)
    }

    /// POST `/vm`. An empty or non-object body is an error even when the
    /// status says success.
    pub fn create_vm(&self, vm: &NewVm) -> Result<VirtualMachine> {
        info!(user_id = vm.user_id, name = %vm.name, os = %vm.operating_system, "creating VM");
        let token = self.require_token("VM creation")?;
        let answer = self
            .send(Method::POST, "/vm", Some(vm), Some(token))
            .map_err(|failure| Error::VmCreation {
                name: vm.name.clone(),
                failure,
            })?;

        let invalid = || Error::VmInvalidResponse {
            name: vm.name.clone(),
            body: truncate_body(&answer.body),
        };
        let value: Value = serde_json::from_str(&answer.body).map_err(|_| invalid())?;
        if !value.as_object().is_some_and(|obj| !obj.is_empty()) {
            return Err(invalid());
        }
        let created: VirtualMachine = serde_json::from_value(value).map_err(|_| invalid())?;
        info!(vm_id = created.id, status = %created.status, "VM created");
        Ok(created)
    }

    /// PATCH `/vm/{id}`.
    pub fn update_vm(&self, vm_id: i64, update: &VmUpdate) -> Result<VirtualMachine> {
        info!(vm_id, "updating VM");
        let token = self.require_token("VM update")?;
        self.send_json(Method::PATCH, &format!("/vm/{vm_id}"), Some(update), Some(token))
            .map_err(|failure| Error::VmUpdate { id: vm_id, failure })
    }

    /// DELETE `/vm/{id}`.
    pub fn delete_vm(&self, vm_id: i64) -> Result<()> {
        info!(vm_id, "deleting VM");
        let token = self.require_token("VM deletion")?;
        self.send(Method::DELETE, &format!("/vm/{vm_id}"), NO_BODY, Some(token))
            .map(|_| ())
            .map_err(|failure| Error::VmDelete { id: vm_id, failure })
    }

    /// POST `/Attach_VM_to_user`.
    pub fn attach_vm_to_user(&self, vm_id: i64, user_id: i64) -> Result<Value> {
        info!(vm_id, user_id, "attaching VM to user");
        let payload = json!({ "vm_id": vm_id, "user_id": user_id });
        self.vm_action("attach", vm_id, "/Attach_VM_to_user", &payload)
    }

    /// POST `/Stop_VM`.
    pub fn stop_vm(&self, vm_id: i64) -> Result<Value> {
        info!(vm_id, "stopping VM");
        let payload = json!({ "vm_id": vm_id });
        self.vm_action("stop", vm_id, "/Stop_VM", &payload)
    }

    fn vm_action(&self, action: &'static str, vm_id: i64, path: &str, payload: &Value) -> Result<Value> {
        let wrap = |failure: HttpFailure| Error::VmAction {
            action,
            vm_id,
            failure,
        };
        let answer = self
            .send(Method::POST, path, Some(payload), self.token())
            .map_err(wrap)?;
        if answer.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        decode(&answer).map_err(wrap)
    }
}
