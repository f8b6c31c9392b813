/// 曝光結果雙緩衝
///
/// 查詢只讀前緩衝，批次只寫後緩衝；交換只是索引翻轉
#[derive(Debug, Clone)]
pub struct ExposureStore {
    buffers: [Vec<bool>; 2],
    front: usize,
    /// 路徑長度暫存，只在剛做完路徑長度計算後有效
    path_lengths: Vec<f32>,
}

impl ExposureStore {
    pub fn new(num_cells: usize) -> Self {
        Self {
            buffers: [vec![false; num_cells], vec![false; num_cells]],
            front: 0,
            path_lengths: vec![f32::INFINITY; num_cells],
        }
    }

    pub fn len(&self) -> usize {
        self.buffers[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// O(1) 交換前後緩衝
    pub fn swap(&mut self) {
        self.front ^= 1;
    }

    /// 讀前緩衝；索引越界時視為未曝光
    pub fn read(&self, index: usize) -> bool {
        self.buffers[self.front].get(index).copied().unwrap_or(false)
    }

    pub fn write_back(&mut self, index: usize, exposed: bool) {
        self.buffers[self.front ^ 1][index] = exposed;
    }

    pub fn front(&self) -> &[bool] {
        &self.buffers[self.front]
    }

    /// 同步模式直接寫前緩衝，不經過交換
    pub(crate) fn front_mut(&mut self) -> &mut [bool] {
        &mut self.buffers[self.front]
    }

    pub(crate) fn back_mut(&mut self) -> &mut [bool] {
        &mut self.buffers[self.front ^ 1]
    }

    pub fn path_lengths(&self) -> &[f32] {
        &self.path_lengths
    }

    pub(crate) fn path_lengths_mut(&mut self) -> &mut [f32] {
        &mut self.path_lengths
    }
}
