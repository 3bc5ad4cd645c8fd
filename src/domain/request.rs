// ==========================================
// 货架存储分配核心 - 入库/出库请求
// ==========================================
// 状态机: Pending -> Finish | Abort
// 红线: 终态不可再变更
// 红线: 出库请求同一时刻最多被一个货架持有预留
// 红线: 中止不自动重排队,由外部环境决定重试
// ==========================================

use crate::domain::error::{StorageError, StorageResult};
use crate::domain::item::{ItemBundle, ItemDescription};
use crate::domain::types::{Placement, PodId, RequestState};
use uuid::Uuid;

fn transition(id: Uuid, state: &mut RequestState, to: RequestState) -> StorageResult<()> {
    if state.is_terminal() {
        return Err(StorageError::InvalidStateTransition {
            request: id,
            from: state.to_string(),
            to: to.to_string(),
        });
    }
    *state = to;
    Ok(())
}

// ==========================================
// InsertRequest - 入库请求
// ==========================================
// 一个批次放入一个已预留格口
#[derive(Debug, Clone)]
pub struct InsertRequest {
    id: Uuid,
    bundle: ItemBundle,
    placement: Placement,
    state: RequestState,
}

impl InsertRequest {
    pub fn new(bundle: ItemBundle, placement: Placement) -> Self {
        Self {
            id: Uuid::new_v4(),
            bundle,
            placement,
            state: RequestState::Pending,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn bundle(&self) -> &ItemBundle {
        &self.bundle
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// 标记完成
    pub fn finish(&mut self) -> StorageResult<()> {
        transition(self.id, &mut self.state, RequestState::Finished)
    }

    /// 标记中止
    pub fn abort(&mut self) -> StorageResult<()> {
        transition(self.id, &mut self.state, RequestState::Aborted)
    }
}

// ==========================================
// ExtractRequest - 出库请求
// ==========================================
// 拣出一件货品;预留步骤绑定货架,撤销时解绑
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    id: Uuid,
    item: ItemDescription,
    state: RequestState,
    assigned_pod: Option<PodId>,
}

impl ExtractRequest {
    pub fn new(item: ItemDescription) -> Self {
        Self {
            id: Uuid::new_v4(),
            item,
            state: RequestState::Pending,
            assigned_pod: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn item(&self) -> &ItemDescription {
        &self.item
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn assigned_pod(&self) -> Option<PodId> {
        self.assigned_pod
    }

    /// 绑定到货架
    ///
    /// 已绑定到同一货架时幂等;已绑定到其他货架时报错
    pub fn assign(&mut self, pod_id: PodId) -> StorageResult<()> {
        match self.assigned_pod {
            Some(current) if current != pod_id => Err(StorageError::RequestAlreadyAssigned {
                request: self.id,
                assigned: current,
                requested: pod_id,
            }),
            _ => {
                self.assigned_pod = Some(pod_id);
                Ok(())
            }
        }
    }

    /// 从货架解绑
    pub fn unassign(&mut self, pod_id: PodId) -> StorageResult<()> {
        match self.assigned_pod {
            Some(current) if current == pod_id => {
                self.assigned_pod = None;
                Ok(())
            }
            _ => Err(StorageError::RequestNotAssigned {
                request: self.id,
                pod: pod_id,
            }),
        }
    }

    /// 标记完成
    pub fn finish(&mut self) -> StorageResult<()> {
        transition(self.id, &mut self.state, RequestState::Finished)
    }

    /// 标记中止
    pub fn abort(&mut self) -> StorageResult<()> {
        transition(self.id, &mut self.state, RequestState::Aborted)
    }
}
