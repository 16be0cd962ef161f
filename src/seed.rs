use crate::models::{PathType, StudentRecord};

const SEED_CREATED_AT: i64 = 1_700_000_000_000;

/// Built-in example records used on first run and for resets.
pub fn seed_records() -> Vec<StudentRecord> {
    let rows = [
        ("向魁炜", "数学与应用数学", PathType::Recommendation, "北京大学"),
        ("罗艺轩", "数学与应用数学", PathType::Recommendation, "复旦大学"),
        ("张嘉逸", "数学与应用数学", PathType::Recommendation, "中国科学技术大学"),
        ("杨柳", "数学与应用数学", PathType::Recommendation, "浙江大学"),
        ("李梦雨", "数学与应用数学", PathType::Recommendation, "南京大学"),
        ("韩佳", "数学与应用数学", PathType::Recommendation, "北京大学"),
        ("俞雪蕾", "信息与计算科学", PathType::Recommendation, "清华大学"),
        ("杨骏成", "信息与计算科学", PathType::Recommendation, "上海交通大学"),
        ("林新迪", "信息与计算科学", PathType::Recommendation, "复旦大学"),
        ("陈佳奇", "信息与计算科学", PathType::Recommendation, "中国科学院大学"),
        ("王鑫淼", "信息与计算科学", PathType::Recommendation, "同济大学"),
        ("王鑫乐", "信息与计算科学", PathType::Recommendation, "浙江大学"),
        ("朱雪婷", "信息与计算科学", PathType::Work, "华为"),
    ];

    rows.into_iter()
        .enumerate()
        .map(|(i, (name, major, path_type, destination))| StudentRecord {
            id: format!("seed-{}", i + 1),
            name: name.to_string(),
            major: major.to_string(),
            year: 2024,
            path_type,
            destination: destination.to_string(),
            contact: None,
            is_anonymous: false,
            created_at: SEED_CREATED_AT + i as i64,
        })
        .collect()
}
