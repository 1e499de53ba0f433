// ==========================================
// 病房床位分配系统 - 房间序号映射
// ==========================================
// 职责: 病区房间列表位置 (ordinal, 0-based) ↔ 持久化房间号
// 生命周期: 每次运行重建, 随运行丢弃, 不作为共享状态
// ==========================================

use crate::domain::room::Room;
use std::collections::HashMap;

// ==========================================
// RoomIndexMap - 双向映射
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct RoomIndexMap {
    ordinal_to_room: Vec<i32>,
    room_to_ordinal: HashMap<i32, usize>,
}

impl RoomIndexMap {
    /// 按房间列表顺序构建映射
    ///
    /// 重复房间号只保留首次出现的位置
    pub fn build(rooms: &[Room]) -> Self {
        let mut map = Self::default();
        for room in rooms {
            if map.room_to_ordinal.contains_key(&room.room_number) {
                tracing::warn!(room_number = room.room_number, "房间列表中存在重复房间号，已忽略");
                continue;
            }
            map.room_to_ordinal
                .insert(room.room_number, map.ordinal_to_room.len());
            map.ordinal_to_room.push(room.room_number);
        }
        map
    }

    pub fn len(&self) -> usize {
        self.ordinal_to_room.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordinal_to_room.is_empty()
    }

    /// 序号 → 房间号
    pub fn to_room_number(&self, ordinal: usize) -> Option<i32> {
        self.ordinal_to_room.get(ordinal).copied()
    }

    /// 房间号 → 序号
    pub fn to_ordinal(&self, room_number: i32) -> Option<usize> {
        self.room_to_ordinal.get(&room_number).copied()
    }

    /// 序号 → 房间号, 不在当前列表中时保持原房间号不变
    pub fn resolve_room_number(&self, ordinal: usize, fallback: i32) -> i32 {
        self.to_room_number(ordinal).unwrap_or(fallback)
    }

    /// 按序号顺序排列的房间 (与求解器数组下标一致)
    pub fn ordered_rooms<'a>(&self, rooms: &'a [Room]) -> Vec<&'a Room> {
        self.ordinal_to_room
            .iter()
            .filter_map(|number| rooms.iter().find(|r| r.room_number == *number))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::BedCategory;

    fn room(number: i32) -> Room {
        Room {
            room_number: number,
            ward_name: "W1".to_string(),
            hospital_code: "H1".to_string(),
            capacity: 2,
            category: BedCategory::Normal,
            overflow_penalty: None,
        }
    }

    #[test]
    fn test_round_trip_for_every_listed_room() {
        let rooms = vec![room(304), room(101), room(205)];
        let map = RoomIndexMap::build(&rooms);

        assert_eq!(map.len(), 3);
        for r in &rooms {
            let ordinal = map.to_ordinal(r.room_number).unwrap();
            assert_eq!(map.to_room_number(ordinal), Some(r.room_number));
        }
        // 序号即列表位置
        assert_eq!(map.to_ordinal(304), Some(0));
        assert_eq!(map.to_ordinal(205), Some(2));
    }

    #[test]
    fn test_unknown_lookups_fall_back() {
        let map = RoomIndexMap::build(&[room(101)]);

        assert_eq!(map.to_ordinal(999), None);
        assert_eq!(map.to_room_number(5), None);
        assert_eq!(map.resolve_room_number(5, 777), 777);
        assert_eq!(map.resolve_room_number(0, 777), 101);
    }

    #[test]
    fn test_duplicate_room_numbers_keep_first_position() {
        let map = RoomIndexMap::build(&[room(101), room(102), room(101)]);
        assert_eq!(map.len(), 2);
        assert_eq!(map.to_ordinal(101), Some(0));
    }
}
